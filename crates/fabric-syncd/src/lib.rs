//! Fabric L3 synchronizer.
//!
//! Mirrors the networks and subnets of the registry (Neutron) onto the
//! physical fabric controller as tenant logical routers, segment interfaces
//! and subnet bindings, and removes fabric objects the registry no longer
//! knows about.
//!
//! A [`Synchronizer`] pass reads a [`FabricSnapshot`] and a
//! [`RegistrySnapshot`], asks the [`DiffEngine`] for operations and hands
//! them to the [`OperationApplier`]. Deletions can be gated on
//! [`Notification`]s collected by the [`listener`] into an [`EventQueue`].

pub mod applier;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod fabric_state;
pub mod identity;
pub mod listener;
pub mod model;
pub mod registry;
pub mod synchronizer;

pub use applier::OperationApplier;
pub use config::{FabricSyncConfig, DEFAULT_CONFIG_PATH};
pub use diff::{AdditionPlan, DeletionPlan, DiffEngine};
pub use error::{SyncError, SyncResult};
pub use events::{filter_by_events, EventQueue, Notification, EVENT_NETWORK_DELETE, EVENT_SUBNET_DELETE};
pub use fabric_state::FabricSnapshot;
pub use identity::{IdentityLookup, KeystoneClient, TokenProvider};
pub use model::{Network, NetworkOp, Subnet, SubnetOp, TenantInterfaceOp};
pub use registry::{NeutronClient, RegistryReader, RegistrySnapshot};
pub use synchronizer::{Added, Deleted, SyncSettings, SyncSummary, Synchronizer};
