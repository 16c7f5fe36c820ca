//! Test fixtures for fabric tenants
//!
//! Provides reusable tenant documents for seeding a [`MemoryFabric`](crate::MemoryFabric)

use l3pe_fabric_client::paths::DEFAULT_ROUTE;
use l3pe_fabric_client::{
    LogicalRouter, SegmentInterface, StaticRoute, Tenant, TenantInterface, SYSTEM_TENANT,
};

/// Deployment id used throughout the fixtures
pub const DEPLOYMENT_ID: &str = "dc1";

/// Fabric tenant name of a project in [`DEPLOYMENT_ID`]
pub fn tenant_name(project: &str) -> String {
    format!("{}.{}", project, DEPLOYMENT_ID)
}

/// Builder for a tenant document
#[derive(Debug, Clone)]
pub struct TenantFixture {
    name: String,
    segments: Vec<SegmentInterface>,
    peered: bool,
}

impl TenantFixture {
    /// A tenant peered with `system` and carrying the default route
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
            peered: true,
        }
    }

    /// Add a segment interface with the given CIDR bindings
    pub fn segment(mut self, segment: &str, cidrs: &[&str]) -> Self {
        let interface = cidrs
            .iter()
            .fold(SegmentInterface::new(segment), |si, c| si.with_cidr(*c));
        self.segments.push(interface);
        self
    }

    /// Drop the peering interface so the router is not fully formed
    pub fn unpeered(mut self) -> Self {
        self.peered = false;
        self
    }

    /// Build the tenant document
    pub fn build(self) -> Tenant {
        let router = LogicalRouter {
            tenant_interfaces: self
                .peered
                .then(|| vec![TenantInterface::new(SYSTEM_TENANT)]),
            segment_interfaces: Some(self.segments),
            static_routes: self.peered.then(|| {
                vec![StaticRoute {
                    dst_ip_subnet: DEFAULT_ROUTE.to_string(),
                    next_hop: None,
                }]
            }),
        };
        Tenant::new(self.name).with_router(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_name() {
        assert_eq!(tenant_name("P1"), "P1.dc1");
    }

    #[test]
    fn test_fixture_is_fully_formed() {
        let tenant = TenantFixture::new("P1.dc1")
            .segment("net1", &["10.0.0.1/24"])
            .build();
        let segment = tenant.segment("net1").unwrap();
        assert_eq!(segment.cidrs().collect::<Vec<_>>(), vec!["10.0.0.1/24"]);
    }

    #[test]
    fn test_unpeered_fixture_is_not_formed() {
        let tenant = TenantFixture::new("P1.dc1")
            .segment("net1", &[])
            .unpeered()
            .build();
        assert!(tenant.segment_interfaces().is_none());
    }
}
