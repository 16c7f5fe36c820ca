//! Shared harness for synchronizer integration tests
//!
//! Wires a [`Synchronizer`] to an in-memory fabric and to registry and
//! identity fakes whose contents tests can change between passes.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use l3pe_fabric_client::{FabricCredentials, FabricSession};
use l3pe_fabric_syncd::{
    DiffEngine, IdentityLookup, Network, OperationApplier, RegistryReader, Subnet, SyncResult,
    SyncSettings, Synchronizer,
};
use l3pe_fabric_test::{MemoryFabric, DEPLOYMENT_ID};
use parking_lot::Mutex;

/// Identity service with a fixed project table
#[derive(Default)]
pub struct StaticIdentity {
    projects: Mutex<BTreeMap<String, String>>,
}

impl StaticIdentity {
    pub fn add_project(&self, id: &str, name: &str) {
        self.projects.lock().insert(id.to_string(), name.to_string());
    }
}

#[async_trait]
impl IdentityLookup for StaticIdentity {
    async fn list_projects(&self) -> SyncResult<BTreeMap<String, String>> {
        Ok(self.projects.lock().clone())
    }
}

/// Registry whose networks and subnets are set by the test
#[derive(Default)]
pub struct StaticRegistry {
    networks: Mutex<Vec<Network>>,
    subnets: Mutex<Vec<Subnet>>,
}

impl StaticRegistry {
    pub fn add_network(&self, network: Network) {
        self.networks.lock().push(network);
    }

    pub fn add_subnet(&self, subnet: Subnet) {
        self.subnets.lock().push(subnet);
    }

    /// Remove a network and its subnets
    pub fn remove_network(&self, network_id: &str) {
        self.networks.lock().retain(|n| n.id != network_id);
        self.subnets.lock().retain(|s| s.network_id != network_id);
    }

    pub fn set_gateway(&self, subnet_id: &str, gateway_ip: &str) {
        for subnet in self.subnets.lock().iter_mut() {
            if subnet.id == subnet_id {
                subnet.gateway_ip = Some(gateway_ip.to_string());
            }
        }
    }
}

#[async_trait]
impl RegistryReader for StaticRegistry {
    async fn list_networks(&self) -> SyncResult<Vec<Network>> {
        Ok(self.networks.lock().clone())
    }

    async fn list_subnets(&self) -> SyncResult<Vec<Subnet>> {
        Ok(self.subnets.lock().clone())
    }
}

/// Pass options for a harness
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    pub dry_run: bool,
    pub settings: SyncSettings,
}

/// A synchronizer over fakes, with no pacing
pub struct Harness {
    pub fabric: Arc<MemoryFabric>,
    pub identity: Arc<StaticIdentity>,
    pub registry: Arc<StaticRegistry>,
    pub synchronizer: Synchronizer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let fabric = Arc::new(MemoryFabric::default());
        let identity = Arc::new(StaticIdentity::default());
        let registry = Arc::new(StaticRegistry::default());

        let session = FabricSession::new(
            FabricCredentials::new("https://fabric.test:8443/api/v1", "admin", "admin"),
            fabric.clone(),
        );
        let synchronizer = Synchronizer::new(
            session,
            identity.clone(),
            registry.clone(),
            DiffEngine::new(DEPLOYMENT_ID),
            OperationApplier::new(Duration::ZERO, options.dry_run),
            options.settings,
        );

        Self {
            fabric,
            identity,
            registry,
            synchronizer,
        }
    }

    /// Project `P1` with network `net1` and subnet `10.0.0.0/24` (gateway `.1`)
    pub fn with_p1_net1() -> Self {
        let harness = Self::new();
        harness.seed_p1_net1();
        harness
    }

    pub fn seed_p1_net1(&self) {
        self.identity.add_project("p1", "P1");
        self.registry.add_network(Network::new("n1", "net1", "p1"));
        self.registry
            .add_subnet(Subnet::new("s1", "p1", "n1", "10.0.0.0/24", "10.0.0.1"));
    }
}
