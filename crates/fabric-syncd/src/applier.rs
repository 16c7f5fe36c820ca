//! Sequential application of fabric operations.
//!
//! Each batch issues one call at a time with a fixed pause after every
//! call. The first failure stops the batch; whatever was applied before it
//! stays applied.

use std::fmt::Debug;
use std::time::Duration;

use l3pe_fabric_client::{FabricResult, FabricSession};
use tracing::{debug, info, instrument};

use crate::error::{SyncError, SyncResult};
use crate::model::{NetworkOp, SubnetOp, TenantInterfaceOp};

/// Applies operation batches to the fabric.
#[derive(Debug, Clone)]
pub struct OperationApplier {
    pacing: Duration,
    dry_run: bool,
}

impl OperationApplier {
    pub fn new(pacing: Duration, dry_run: bool) -> Self {
        Self { pacing, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// In dry-run mode logs the batch and returns true.
    fn skip<T: Debug>(&self, category: &str, ops: &[T]) -> bool {
        if self.dry_run && !ops.is_empty() {
            info!(category, count = ops.len(), ?ops, "Dry run, not applying");
        }
        self.dry_run
    }

    /// Records the outcome of one call.
    async fn record<T: Debug>(
        &self,
        category: &str,
        result: FabricResult<()>,
        op: T,
        applied: &mut Vec<T>,
    ) -> SyncResult<()> {
        if let Err(source) = result {
            return Err(SyncError::partial_apply(category, applied.len(), source));
        }
        debug!(category, ?op, "Applied");
        applied.push(op);
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = ops.len()))]
    pub async fn create_networks(
        &self,
        session: &mut FabricSession,
        ops: Vec<NetworkOp>,
    ) -> SyncResult<Vec<NetworkOp>> {
        if self.skip("create_network", &ops) {
            return Ok(ops);
        }
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            let result = session
                .create_network(&op.project_name, &op.segment_name)
                .await;
            self.record("create_network", result, op, &mut applied)
                .await?;
        }
        Ok(applied)
    }

    /// Creates new subnets and rewrites updated ones.
    #[instrument(skip_all, fields(count = ops.len()))]
    pub async fn apply_subnets(
        &self,
        session: &mut FabricSession,
        ops: Vec<SubnetOp>,
    ) -> SyncResult<Vec<SubnetOp>> {
        if self.skip("create_subnet", &ops) {
            return Ok(ops);
        }
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            let result = match op.original_gateway_ip.as_deref() {
                Some(original) => {
                    session
                        .update_subnet(
                            &op.project_name,
                            &op.segment_name,
                            Some(original),
                            &op.current_gateway_ip,
                        )
                        .await
                }
                None => {
                    session
                        .create_subnet(&op.project_name, &op.segment_name, &op.current_gateway_ip)
                        .await
                }
            };
            self.record("create_subnet", result, op, &mut applied)
                .await?;
        }
        Ok(applied)
    }

    #[instrument(skip_all, fields(count = ops.len()))]
    pub async fn delete_subnets(
        &self,
        session: &mut FabricSession,
        ops: Vec<SubnetOp>,
    ) -> SyncResult<Vec<SubnetOp>> {
        if self.skip("delete_subnet", &ops) {
            return Ok(ops);
        }
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            let result = session
                .delete_subnet(&op.project_name, &op.segment_name, &op.current_gateway_ip)
                .await;
            self.record("delete_subnet", result, op, &mut applied)
                .await?;
        }
        Ok(applied)
    }

    #[instrument(skip_all, fields(count = ops.len()))]
    pub async fn delete_networks(
        &self,
        session: &mut FabricSession,
        ops: Vec<NetworkOp>,
    ) -> SyncResult<Vec<NetworkOp>> {
        if self.skip("delete_network", &ops) {
            return Ok(ops);
        }
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            let result = session
                .delete_network(&op.project_name, &op.segment_name)
                .await;
            self.record("delete_network", result, op, &mut applied)
                .await?;
        }
        Ok(applied)
    }

    #[instrument(skip_all, fields(count = ops.len()))]
    pub async fn delete_tenant_interfaces(
        &self,
        session: &mut FabricSession,
        ops: Vec<TenantInterfaceOp>,
    ) -> SyncResult<Vec<TenantInterfaceOp>> {
        if self.skip("delete_system_tenant_interface", &ops) {
            return Ok(ops);
        }
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            let result = session
                .delete_system_tenant_interface(&op.remote_tenant)
                .await;
            self.record("delete_system_tenant_interface", result, op, &mut applied)
                .await?;
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l3pe_fabric_client::{FabricCredentials, Method};
    use l3pe_fabric_test::fixtures::TenantFixture;
    use l3pe_fabric_test::{FabricVerifier, MemoryFabric};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn session(fabric: &Arc<MemoryFabric>) -> FabricSession {
        FabricSession::new(
            FabricCredentials::new("https://bcf:8443/api/v1", "admin", "admin"),
            fabric.clone(),
        )
    }

    #[tokio::test]
    async fn test_creates_networks_and_subnets() {
        let fabric = Arc::new(MemoryFabric::default());
        let mut session = session(&fabric);
        let applier = OperationApplier::new(Duration::ZERO, false);

        let networks = applier
            .create_networks(&mut session, vec![NetworkOp::new("P1.dc1", "net1")])
            .await
            .unwrap();
        let subnets = applier
            .apply_subnets(
                &mut session,
                vec![SubnetOp::new("P1.dc1", "net1", "10.0.0.1/24")],
            )
            .await
            .unwrap();

        assert_eq!(networks.len(), 1);
        assert_eq!(subnets.len(), 1);
        let verifier = FabricVerifier::new(&fabric);
        verifier.assert_peered("P1.dc1").unwrap();
        verifier.assert_cidrs("P1.dc1", "net1", &["10.0.0.1/24"]).unwrap();
    }

    #[tokio::test]
    async fn test_update_rewrites_stale_cidr() {
        let fabric = Arc::new(MemoryFabric::default());
        fabric.insert_tenant(
            &TenantFixture::new("P1.dc1")
                .segment("net1", &["10.0.0.1/24"])
                .build(),
        );
        let mut session = session(&fabric);
        let applier = OperationApplier::new(Duration::ZERO, false);

        applier
            .apply_subnets(
                &mut session,
                vec![SubnetOp::update("P1.dc1", "net1", "10.0.0.1/24", "10.0.0.2/24")],
            )
            .await
            .unwrap();

        FabricVerifier::new(&fabric)
            .assert_cidrs("P1.dc1", "net1", &["10.0.0.2/24"])
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_failure_stops_batch() {
        let fabric = Arc::new(MemoryFabric::default());
        fabric.fail_when(Method::Put, "segment-interface[segment=\"net2\"]", 409);
        let mut session = session(&fabric);
        let applier = OperationApplier::new(Duration::ZERO, false);

        let err = applier
            .create_networks(
                &mut session,
                vec![
                    NetworkOp::new("P1.dc1", "net1"),
                    NetworkOp::new("P1.dc1", "net2"),
                    NetworkOp::new("P1.dc1", "net3"),
                ],
            )
            .await
            .unwrap_err();

        match err {
            SyncError::PartialApply {
                category, applied, ..
            } => {
                assert_eq!(category, "create_network");
                assert_eq!(applied, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        let verifier = FabricVerifier::new(&fabric);
        verifier.assert_segment_exists("P1.dc1", "net1").unwrap();
        verifier.assert_segment_absent("P1.dc1", "net3").unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let fabric = Arc::new(MemoryFabric::default());
        let mut session = session(&fabric);
        let applier = OperationApplier::new(Duration::ZERO, true);
        let ops = vec![NetworkOp::new("P1.dc1", "net1")];

        let returned = applier
            .delete_networks(&mut session, ops.clone())
            .await
            .unwrap();

        assert_eq!(returned, ops);
        assert!(fabric.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_after_each_call() {
        let fabric = Arc::new(MemoryFabric::default());
        let mut session = session(&fabric);
        let pacing = Duration::from_millis(500);
        let ops = vec![
            NetworkOp::new("P1.dc1", "net1"),
            NetworkOp::new("P1.dc1", "net2"),
            NetworkOp::new("P1.dc1", "net3"),
        ];

        let started = tokio::time::Instant::now();
        let applied = OperationApplier::new(pacing, false)
            .create_networks(&mut session, ops.clone())
            .await
            .unwrap();
        assert_eq!(applied.len(), 3);
        assert_eq!(started.elapsed(), pacing * 3);

        let started = tokio::time::Instant::now();
        OperationApplier::new(pacing, true)
            .delete_networks(&mut session, ops)
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
