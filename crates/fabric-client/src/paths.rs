//! Resource locators for fabric controller objects.
//!
//! Fabric objects are addressed by key expressions embedded in the path
//! (`tenant[name="..."]`). [`FabricPath`] renders the raw locator and its
//! percent-encoded form; callers never format paths by hand.

use std::fmt;

/// Root of the fabric application data tree.
pub const BASE_PATH: &str = "/data/controller/applications/bcf";

/// Root of the controller AAA session tree.
pub const AAA_SESSION_BASE: &str = "/data/controller/core/aaa";

/// Name of the fabric tenant that peers with every project tenant.
pub const SYSTEM_TENANT: &str = "system";

/// Destination of the default route installed in every tenant router.
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// A fabric resource locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FabricPath {
    /// All tenants.
    Tenants,
    /// Tenant interface on `tenant` peering with `remote`.
    TenantInterface { tenant: String, remote: String },
    /// All tenant interfaces of `tenant`.
    TenantInterfaces { tenant: String },
    /// Default static route of `tenant`.
    StaticRoute { tenant: String },
    /// All segment interfaces of `tenant`.
    SegmentInterfaces { tenant: String },
    /// Segment interface `segment` of `tenant`.
    SegmentInterface { tenant: String, segment: String },
    /// Subnet binding `cidr` on segment interface `segment` of `tenant`.
    IpSubnet {
        tenant: String,
        segment: String,
        cidr: String,
    },
    /// Authenticated session identified by `token`.
    AaaSession { token: String },
}

impl FabricPath {
    pub fn tenant_interface(tenant: impl Into<String>, remote: impl Into<String>) -> Self {
        Self::TenantInterface {
            tenant: tenant.into(),
            remote: remote.into(),
        }
    }

    pub fn tenant_interfaces(tenant: impl Into<String>) -> Self {
        Self::TenantInterfaces {
            tenant: tenant.into(),
        }
    }

    pub fn static_route(tenant: impl Into<String>) -> Self {
        Self::StaticRoute {
            tenant: tenant.into(),
        }
    }

    pub fn segment_interfaces(tenant: impl Into<String>) -> Self {
        Self::SegmentInterfaces {
            tenant: tenant.into(),
        }
    }

    pub fn segment_interface(tenant: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::SegmentInterface {
            tenant: tenant.into(),
            segment: segment.into(),
        }
    }

    pub fn ip_subnet(
        tenant: impl Into<String>,
        segment: impl Into<String>,
        cidr: impl Into<String>,
    ) -> Self {
        Self::IpSubnet {
            tenant: tenant.into(),
            segment: segment.into(),
            cidr: cidr.into(),
        }
    }

    pub fn aaa_session(token: impl Into<String>) -> Self {
        Self::AaaSession {
            token: token.into(),
        }
    }

    /// Returns the locator with every character outside the unreserved set
    /// percent-encoded, keeping `/` literal.
    pub fn encoded(&self) -> String {
        encode_path(&self.to_string())
    }
}

fn router(tenant: &str) -> String {
    format!("{}/tenant[name=\"{}\"]/logical-router", BASE_PATH, tenant)
}

impl fmt::Display for FabricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricPath::Tenants => write!(f, "{}/tenant", BASE_PATH),
            FabricPath::TenantInterface { tenant, remote } => write!(
                f,
                "{}/tenant-interface[remote-tenant=\"{}\"]",
                router(tenant),
                remote
            ),
            FabricPath::TenantInterfaces { tenant } => {
                write!(f, "{}/tenant-interface", router(tenant))
            }
            FabricPath::StaticRoute { tenant } => write!(
                f,
                "{}/static-route[dst-ip-subnet=\"{}\"]",
                router(tenant),
                DEFAULT_ROUTE
            ),
            FabricPath::SegmentInterfaces { tenant } => {
                write!(f, "{}/segment-interface", router(tenant))
            }
            FabricPath::SegmentInterface { tenant, segment } => write!(
                f,
                "{}/segment-interface[segment=\"{}\"]",
                router(tenant),
                segment
            ),
            FabricPath::IpSubnet {
                tenant,
                segment,
                cidr,
            } => write!(
                f,
                "{}/segment-interface[segment=\"{}\"]/ip-subnet[ip-cidr=\"{}\"]",
                router(tenant),
                segment,
                cidr
            ),
            FabricPath::AaaSession { token } => {
                write!(f, "{}/session[auth-token=\"{}\"]", AAA_SESSION_BASE, token)
            }
        }
    }
}

/// Percent-encodes a path segment by segment so `/` separators survive.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
