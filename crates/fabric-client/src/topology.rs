//! Tenant router topology operations.
//!
//! Every mutating operation starts a fresh session and is a fixed
//! sequence of REST calls; the first failing call aborts the sequence.

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::error::{FabricError, FabricResult};
use crate::paths::{FabricPath, DEFAULT_ROUTE, SYSTEM_TENANT};
use crate::session::FabricSession;
use crate::transport::Method;
use crate::types::{SegmentInterface, Tenant, TenantInterface};

fn require(operation: &str, args: &[(&str, &str)]) -> FabricResult<()> {
    let empty: Vec<&str> = args
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if empty.is_empty() {
        Ok(())
    } else {
        let message = format!("empty {}", empty.join(", "));
        debug!(operation, %message, "Rejecting fabric operation");
        Err(FabricError::invalid_input(operation, message))
    }
}

/// Tenant name suffix for a deployment.
fn deployment_suffix(deployment_id: &str) -> String {
    format!(".{}", deployment_id)
}

impl FabricSession {
    /// Lists the tenants that belong to `deployment_id`.
    #[instrument(skip(self))]
    pub async fn list_tenants(&self, deployment_id: &str) -> FabricResult<Vec<Tenant>> {
        let suffix = deployment_suffix(deployment_id);
        let tenants: Vec<Tenant> = self.get_json(&FabricPath::Tenants).await?;
        Ok(tenants
            .into_iter()
            .filter(|t| t.name.ends_with(&suffix))
            .collect())
    }

    /// Lists the `system` tenant interfaces peering with `deployment_id`
    /// tenants.
    #[instrument(skip(self))]
    pub async fn list_system_tenant_interfaces(
        &self,
        deployment_id: &str,
    ) -> FabricResult<Vec<TenantInterface>> {
        let suffix = deployment_suffix(deployment_id);
        let interfaces: Vec<TenantInterface> = self
            .get_json(&FabricPath::tenant_interfaces(SYSTEM_TENANT))
            .await?;
        Ok(interfaces
            .into_iter()
            .filter(|i| i.remote_tenant.ends_with(&suffix))
            .collect())
    }

    /// Lists the segment interfaces of `tenant`.
    pub async fn segment_interfaces(&self, tenant: &str) -> FabricResult<Vec<SegmentInterface>> {
        self.get_json(&FabricPath::segment_interfaces(tenant)).await
    }

    /// Creates the segment interface for `segment` under `tenant`.
    ///
    /// Also (re)installs both peering interfaces with the `system` tenant
    /// and the default route; these PUTs are idempotent on the controller.
    #[instrument(skip(self))]
    pub async fn create_network(&mut self, tenant: &str, segment: &str) -> FabricResult<()> {
        require(
            "create_network",
            &[("tenant_name", tenant), ("segment_name", segment)],
        )?;
        self.renew_session().await?;

        self.request(
            &FabricPath::tenant_interface(SYSTEM_TENANT, tenant),
            &json!({ "remote-tenant": tenant }),
            Method::Put,
        )
        .await?;
        self.request(
            &FabricPath::tenant_interface(tenant, SYSTEM_TENANT),
            &json!({ "remote-tenant": SYSTEM_TENANT }),
            Method::Put,
        )
        .await?;
        self.request(
            &FabricPath::static_route(tenant),
            &json!({
                "next-hop": { "tenant": SYSTEM_TENANT },
                "dst-ip-subnet": DEFAULT_ROUTE,
            }),
            Method::Put,
        )
        .await?;
        self.request(
            &FabricPath::segment_interface(tenant, segment),
            &json!({ "segment": segment }),
            Method::Put,
        )
        .await?;

        info!(tenant, segment, "Created fabric network");
        Ok(())
    }

    /// Binds `cidr` to the segment interface.
    pub async fn create_subnet(
        &mut self,
        tenant: &str,
        segment: &str,
        cidr: &str,
    ) -> FabricResult<()> {
        self.update_subnet(tenant, segment, Some(cidr), cidr).await
    }

    /// Rewrites the binding addressed by `original` (or `current` when
    /// there is none) to `current`.
    #[instrument(skip(self))]
    pub async fn update_subnet(
        &mut self,
        tenant: &str,
        segment: &str,
        original: Option<&str>,
        current: &str,
    ) -> FabricResult<()> {
        require(
            "update_subnet",
            &[
                ("tenant_name", tenant),
                ("segment_name", segment),
                ("current_ip_cidr", current),
            ],
        )?;
        self.renew_session().await?;

        let original = original.filter(|o| !o.is_empty()).unwrap_or(current);
        self.request(
            &FabricPath::ip_subnet(tenant, segment, original),
            &json!({ "ip-cidr": current }),
            Method::Put,
        )
        .await?;

        info!(tenant, segment, original, current, "Updated fabric subnet");
        Ok(())
    }

    /// Removes the `cidr` binding from the segment interface.
    #[instrument(skip(self))]
    pub async fn delete_subnet(
        &mut self,
        tenant: &str,
        segment: &str,
        cidr: &str,
    ) -> FabricResult<()> {
        require(
            "delete_subnet",
            &[
                ("tenant_name", tenant),
                ("segment_name", segment),
                ("ip_cidr", cidr),
            ],
        )?;
        self.renew_session().await?;

        self.request(
            &FabricPath::ip_subnet(tenant, segment, cidr),
            &json!({}),
            Method::Delete,
        )
        .await?;

        info!(tenant, segment, cidr, "Deleted fabric subnet");
        Ok(())
    }

    /// Removes the segment interface; when it was the tenant's last one the
    /// default route and both peering interfaces go too.
    #[instrument(skip(self))]
    pub async fn delete_network(&mut self, tenant: &str, segment: &str) -> FabricResult<()> {
        require(
            "delete_network",
            &[("tenant_name", tenant), ("segment_name", segment)],
        )?;
        self.renew_session().await?;

        self.request(
            &FabricPath::segment_interface(tenant, segment),
            &json!({}),
            Method::Delete,
        )
        .await?;

        let remaining = self.segment_interfaces(tenant).await?;
        if !remaining.is_empty() {
            debug!(
                tenant,
                remaining = remaining.len(),
                "Keeping static route and tenant interfaces"
            );
            info!(tenant, segment, "Deleted fabric network");
            return Ok(());
        }

        self.request(&FabricPath::static_route(tenant), &json!({}), Method::Delete)
            .await?;
        self.request(
            &FabricPath::tenant_interface(SYSTEM_TENANT, tenant),
            &json!({}),
            Method::Delete,
        )
        .await?;
        self.request(
            &FabricPath::tenant_interface(tenant, SYSTEM_TENANT),
            &json!({}),
            Method::Delete,
        )
        .await?;

        info!(tenant, segment, "Deleted fabric network and tenant router peering");
        Ok(())
    }

    /// Removes the `system` side peering interface towards `remote`.
    #[instrument(skip(self))]
    pub async fn delete_system_tenant_interface(&mut self, remote: &str) -> FabricResult<()> {
        require("delete_system_tenant_interface", &[("remote_tenant", remote)])?;
        self.renew_session().await?;

        self.request(
            &FabricPath::tenant_interface(SYSTEM_TENANT, remote),
            &json!({}),
            Method::Delete,
        )
        .await?;

        info!(remote, "Deleted system tenant interface");
        Ok(())
    }
}
