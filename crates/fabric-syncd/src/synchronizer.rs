//! One synchronization pass.
//!
//! A pass renews the fabric session, reads both snapshots, applies the
//! additions, recomputes deletions against the same snapshots, optionally
//! gates them on deletion notifications and applies them. The session is
//! torn down at the end whether or not the pass succeeded.

use std::sync::Arc;

use l3pe_fabric_client::FabricSession;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::applier::OperationApplier;
use crate::diff::DiffEngine;
use crate::error::SyncResult;
use crate::events::{filter_by_events, Notification};
use crate::fabric_state::FabricSnapshot;
use crate::identity::IdentityLookup;
use crate::model::{NetworkOp, SubnetOp, TenantInterfaceOp};
use crate::registry::{RegistryReader, RegistrySnapshot};

/// Operations added during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Added {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network: Vec<NetworkOp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnet: Vec<SubnetOp>,
}

impl Added {
    pub fn is_empty(&self) -> bool {
        self.network.is_empty() && self.subnet.is_empty()
    }
}

/// Operations deleted during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deleted {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetOp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkOp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system_tenant_interfaces: Vec<TenantInterfaceOp>,
}

impl Deleted {
    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty() && self.networks.is_empty() && self.system_tenant_interfaces.is_empty()
    }
}

/// What a pass applied (or, in dry-run mode, would have applied).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    #[serde(skip_serializing_if = "Added::is_empty")]
    pub added: Added,
    #[serde(skip_serializing_if = "Deleted::is_empty")]
    pub deleted: Deleted,
}

impl SyncSummary {
    /// Returns true if the pass found nothing to do.
    pub fn is_converged(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Pass options that are not part of the diff itself.
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    /// Physical network tags whose networks are left alone.
    pub exclude_physical_networks: Vec<String>,
    /// Delete `system` tenant interfaces towards tenants that no longer
    /// exist anywhere.
    pub prune_orphan_tenant_interfaces: bool,
}

/// Reconciles the fabric against the registry.
pub struct Synchronizer {
    session: FabricSession,
    identity: Arc<dyn IdentityLookup>,
    registry: Arc<dyn RegistryReader>,
    diff: DiffEngine,
    applier: OperationApplier,
    settings: SyncSettings,
}

impl Synchronizer {
    pub fn new(
        session: FabricSession,
        identity: Arc<dyn IdentityLookup>,
        registry: Arc<dyn RegistryReader>,
        diff: DiffEngine,
        applier: OperationApplier,
        settings: SyncSettings,
    ) -> Self {
        Self {
            session,
            identity,
            registry,
            diff,
            applier,
            settings,
        }
    }

    /// Runs one pass.
    ///
    /// With `Some(events)` a deletion candidate is applied only if some
    /// notification payload equals it; with `None` every candidate is.
    #[instrument(skip_all, fields(deployment_id = %self.diff.deployment_id()))]
    pub async fn synchronize(
        &mut self,
        events: Option<Vec<Notification>>,
    ) -> SyncResult<SyncSummary> {
        let result = self.run_pass(events.as_deref()).await;
        self.session.close().await;

        let summary = result?;
        if summary.is_converged() {
            info!("Already synchronized");
        } else {
            match serde_json::to_string(&summary) {
                Ok(json) => info!(summary = %json, "Synchronization pass applied changes"),
                Err(e) => warn!(error = %e, ?summary, "Cannot render synchronization summary"),
            }
        }
        Ok(summary)
    }

    async fn run_pass(&mut self, events: Option<&[Notification]>) -> SyncResult<SyncSummary> {
        self.session.renew_session().await?;

        let fabric = FabricSnapshot::load(&self.session, self.diff.deployment_id()).await?;
        let registry = RegistrySnapshot::load(
            self.identity.as_ref(),
            self.registry.as_ref(),
            &self.settings.exclude_physical_networks,
        )
        .await?;

        let mut summary = SyncSummary::default();

        let additions = self.diff.additions(&registry, &fabric)?;
        summary.added.network = self
            .applier
            .create_networks(&mut self.session, additions.networks)
            .await?;
        summary.added.subnet = self
            .applier
            .apply_subnets(&mut self.session, additions.subnets)
            .await?;

        let superseded: Vec<SubnetOp> = summary
            .added
            .subnet
            .iter()
            .filter(|op| op.is_update())
            .cloned()
            .collect();
        let mut deletions = self.diff.deletions(&registry, &fabric, &superseded)?;
        if let Some(events) = events {
            deletions.subnets = filter_by_events(events, deletions.subnets);
            deletions.networks = filter_by_events(events, deletions.networks);
        }

        summary.deleted.subnets = self
            .applier
            .delete_subnets(&mut self.session, deletions.subnets)
            .await?;
        summary.deleted.networks = self
            .applier
            .delete_networks(&mut self.session, deletions.networks)
            .await?;

        if self.settings.prune_orphan_tenant_interfaces {
            let orphans = self.diff.orphan_tenant_interfaces(&registry, &fabric);
            summary.deleted.system_tenant_interfaces = self
                .applier
                .delete_tenant_interfaces(&mut self.session, orphans)
                .await?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_summary_omits_empty_keys() {
        let summary = SyncSummary::default();
        assert!(summary.is_converged());
        assert_eq!(serde_json::to_value(&summary).unwrap(), json!({}));

        let summary = SyncSummary {
            added: Added {
                network: vec![NetworkOp::new("P1.dc1", "net1")],
                subnet: vec![],
            },
            deleted: Deleted::default(),
        };
        assert!(!summary.is_converged());
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "added": {
                    "network": [{"project_name": "P1.dc1", "segment_name": "net1"}]
                }
            })
        );
    }
}
