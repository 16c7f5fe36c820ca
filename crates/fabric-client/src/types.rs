//! Fabric-side object model.
//!
//! These mirror the JSON documents returned by the controller. Keys that
//! the controller omits are modelled as `Option` so that "absent" and
//! "present but empty" stay distinguishable.

use serde::{Deserialize, Serialize};

/// A fabric tenant (`<project-name>.<deployment-id>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    #[serde(
        rename = "logical-router",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub logical_router: Option<LogicalRouter>,
}

impl Tenant {
    /// Creates a tenant without a logical router.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logical_router: None,
        }
    }

    /// Attaches a logical router.
    pub fn with_router(mut self, router: LogicalRouter) -> Self {
        self.logical_router = Some(router);
        self
    }

    /// Returns the segment interfaces if the router is fully formed.
    ///
    /// A router is fully formed when both `tenant-interface` and
    /// `segment-interface` keys are present.
    pub fn segment_interfaces(&self) -> Option<&[SegmentInterface]> {
        let router = self.logical_router.as_ref()?;
        router.tenant_interfaces.as_ref()?;
        router.segment_interfaces.as_deref()
    }

    /// Looks up a segment interface by segment name on a fully formed router.
    pub fn segment(&self, segment: &str) -> Option<&SegmentInterface> {
        self.segment_interfaces()?
            .iter()
            .find(|si| si.segment == segment)
    }
}

/// Logical router of a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalRouter {
    #[serde(
        rename = "tenant-interface",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant_interfaces: Option<Vec<TenantInterface>>,
    #[serde(
        rename = "segment-interface",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub segment_interfaces: Option<Vec<SegmentInterface>>,
    #[serde(
        rename = "static-route",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub static_routes: Option<Vec<StaticRoute>>,
}

/// Peering interface towards another tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInterface {
    #[serde(rename = "remote-tenant")]
    pub remote_tenant: String,
}

impl TenantInterface {
    pub fn new(remote_tenant: impl Into<String>) -> Self {
        Self {
            remote_tenant: remote_tenant.into(),
        }
    }
}

/// Router interface on a segment (one registry network).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInterface {
    #[serde(default)]
    pub segment: String,
    #[serde(rename = "ip-subnet", default, skip_serializing_if = "Option::is_none")]
    pub ip_subnets: Option<Vec<IpSubnet>>,
}

impl SegmentInterface {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ip_subnets: None,
        }
    }

    /// Adds an `ip-subnet` binding.
    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.ip_subnets
            .get_or_insert_with(Vec::new)
            .push(IpSubnet::new(cidr));
        self
    }

    /// Iterates over the `ip-cidr` values, skipping entries without one.
    pub fn cidrs(&self) -> impl Iterator<Item = &str> {
        self.ip_subnets
            .iter()
            .flatten()
            .filter_map(|s| s.ip_cidr.as_deref())
    }
}

/// Gateway address bound to a segment interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSubnet {
    #[serde(rename = "ip-cidr", default, skip_serializing_if = "Option::is_none")]
    pub ip_cidr: Option<String>,
}

impl IpSubnet {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            ip_cidr: Some(cidr.into()),
        }
    }
}

/// Static route of a tenant router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    #[serde(rename = "dst-ip-subnet")]
    pub dst_ip_subnet: String,
    #[serde(rename = "next-hop", default, skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<NextHop>,
}

/// Next hop of a static route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_tenant() {
        let json = r#"{
            "name": "P1.dc1",
            "logical-router": {
                "tenant-interface": [{"remote-tenant": "system"}],
                "segment-interface": [
                    {"segment": "net1", "ip-subnet": [{"ip-cidr": "10.0.0.1/24"}, {}]}
                ],
                "static-route": [
                    {"dst-ip-subnet": "0.0.0.0/0", "next-hop": {"tenant": "system"}}
                ]
            }
        }"#;
        let tenant: Tenant = serde_json::from_str(json).unwrap();

        assert_eq!(tenant.name, "P1.dc1");
        let segment = tenant.segment("net1").unwrap();
        assert_eq!(segment.cidrs().collect::<Vec<_>>(), vec!["10.0.0.1/24"]);
        let routes = tenant
            .logical_router
            .as_ref()
            .and_then(|r| r.static_routes.as_ref())
            .unwrap();
        assert_eq!(routes[0].dst_ip_subnet, "0.0.0.0/0");
    }

    #[test]
    fn test_router_without_tenant_interface_is_not_formed() {
        let tenant = Tenant::new("P1.dc1").with_router(LogicalRouter {
            tenant_interfaces: None,
            segment_interfaces: Some(vec![SegmentInterface::new("net1")]),
            static_routes: None,
        });
        assert!(tenant.segment_interfaces().is_none());
        assert!(tenant.segment("net1").is_none());
    }

    #[test]
    fn test_tenant_without_router() {
        let tenant: Tenant = serde_json::from_str(r#"{"name": "P2.dc1"}"#).unwrap();
        assert!(tenant.logical_router.is_none());
        assert!(tenant.segment_interfaces().is_none());
    }

    #[test]
    fn test_serialize_skips_absent_keys() {
        let segment = SegmentInterface::new("net1");
        assert_eq!(
            serde_json::to_string(&segment).unwrap(),
            r#"{"segment":"net1"}"#
        );
    }
}
