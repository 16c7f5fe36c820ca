//! Integration test infrastructure for the fabric synchronizer
//!
//! Provides:
//! - An in-memory fabric controller implementing the REST transport
//! - Tenant fixtures for seeding fabric state
//! - Fabric state and request-log verification helpers

pub mod fixtures;
mod memory_fabric;
mod verification;

pub use fixtures::*;
pub use memory_fabric::MemoryFabric;
pub use verification::*;
