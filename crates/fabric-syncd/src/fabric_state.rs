//! Actual-state snapshot read from the fabric.

use l3pe_fabric_client::{FabricSession, SegmentInterface, Tenant, TenantInterface};
use tracing::{debug, instrument};

use crate::error::SyncResult;

/// Tenants of one deployment and the `system` tenant interfaces peering
/// with them, read once per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FabricSnapshot {
    pub tenants: Vec<Tenant>,
    pub system_tenant_interfaces: Vec<TenantInterface>,
}

impl FabricSnapshot {
    #[instrument(skip(session))]
    pub async fn load(session: &FabricSession, deployment_id: &str) -> SyncResult<Self> {
        let tenants = session.list_tenants(deployment_id).await?;
        let system_tenant_interfaces = session.list_system_tenant_interfaces(deployment_id).await?;
        debug!(
            tenants = tenants.len(),
            system_tenant_interfaces = system_tenant_interfaces.len(),
            "Read fabric snapshot"
        );
        Ok(Self {
            tenants,
            system_tenant_interfaces,
        })
    }

    pub fn tenant(&self, name: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.name == name)
    }

    /// Segment interface `segment` of `tenant`, if the tenant's router is
    /// fully formed.
    pub fn segment(&self, tenant: &str, segment: &str) -> Option<&SegmentInterface> {
        self.tenant(tenant)?.segment(segment)
    }

    /// Tenants whose logical router is fully formed, with their segments.
    pub fn formed_tenants(&self) -> impl Iterator<Item = (&Tenant, &[SegmentInterface])> {
        self.tenants
            .iter()
            .filter_map(|t| t.segment_interfaces().map(|segments| (t, segments)))
    }
}
