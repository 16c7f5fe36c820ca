//! Registry records and fabric operations.
//!
//! Operations serialize with the field names carried by deletion
//! notifications, so a candidate and a notification payload can be
//! compared as JSON values.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// A registry network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    /// Fabric segment name.
    pub name: String,
    /// Owning project id.
    pub tenant_id: String,
    /// Physical network tags of all provider segments.
    pub physical_networks: Vec<String>,
}

impl Network {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tenant_id: tenant_id.into(),
            physical_networks: Vec::new(),
        }
    }

    /// Adds a physical network tag.
    pub fn on_physical_network(mut self, tag: impl Into<String>) -> Self {
        self.physical_networks.push(tag.into());
        self
    }

    /// Returns true if any tag is in `excludes`.
    pub fn is_excluded(&self, excludes: &[String]) -> bool {
        self.physical_networks.iter().any(|tag| excludes.contains(tag))
    }
}

/// A registry subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub tenant_id: String,
    pub network_id: String,
    pub cidr: Option<String>,
    pub gateway_ip: Option<String>,
}

impl Subnet {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        network_id: impl Into<String>,
        cidr: impl Into<String>,
        gateway_ip: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            network_id: network_id.into(),
            cidr: Some(cidr.into()),
            gateway_ip: Some(gateway_ip.into()),
        }
    }

    /// Gateway address with the subnet's prefix length, e.g. `10.0.0.1/24`.
    ///
    /// `None` when the subnet has no gateway; such a subnet has no fabric
    /// counterpart. A gateway on a subnet whose CIDR is missing or has no
    /// prefix length is invalid.
    pub fn gateway_cidr(&self) -> SyncResult<Option<String>> {
        let Some(gateway) = self.gateway_ip.as_deref().filter(|g| !g.is_empty()) else {
            return Ok(None);
        };

        let cidr = self
            .cidr
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SyncError::validation("subnet", &self.id, "missing cidr"))?;

        match cidr.split_once('/') {
            Some((_, mask)) if !mask.is_empty() => Ok(Some(format!("{}/{}", gateway, mask))),
            _ => Err(SyncError::validation(
                "subnet",
                &self.id,
                format!("cidr '{}' has no prefix length", cidr),
            )),
        }
    }
}

/// Create or delete a segment interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkOp {
    /// Fabric tenant name.
    pub project_name: String,
    /// Segment name.
    pub segment_name: String,
}

impl NetworkOp {
    pub fn new(project_name: impl Into<String>, segment_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            segment_name: segment_name.into(),
        }
    }
}

/// Create, update or delete a subnet binding.
///
/// An update carries `original_gateway_ip`, the stale fabric value to
/// rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubnetOp {
    pub project_name: String,
    pub segment_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_gateway_ip: Option<String>,
    pub current_gateway_ip: String,
}

impl SubnetOp {
    /// A create (or, in a deletion list, a delete) of `gateway_cidr`.
    pub fn new(
        project_name: impl Into<String>,
        segment_name: impl Into<String>,
        gateway_cidr: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            segment_name: segment_name.into(),
            original_gateway_ip: None,
            current_gateway_ip: gateway_cidr.into(),
        }
    }

    /// An update from `original` to `current`.
    pub fn update(
        project_name: impl Into<String>,
        segment_name: impl Into<String>,
        original: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        Self {
            original_gateway_ip: Some(original.into()),
            ..Self::new(project_name, segment_name, current)
        }
    }

    pub fn is_update(&self) -> bool {
        self.original_gateway_ip.is_some()
    }
}

/// Delete an orphaned `system` tenant interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantInterfaceOp {
    pub remote_tenant: String,
}

impl TenantInterfaceOp {
    pub fn new(remote_tenant: impl Into<String>) -> Self {
        Self {
            remote_tenant: remote_tenant.into(),
        }
    }
}
