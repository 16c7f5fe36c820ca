//! Verification helpers for synchronization tests
//!
//! Provides assertion helpers over the state and request log of a
//! [`MemoryFabric`]

use crate::MemoryFabric;
use l3pe_fabric_client::SYSTEM_TENANT;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected segment interface '{segment}' not found in tenant '{tenant}'")]
    SegmentNotFound { tenant: String, segment: String },

    #[error("Unexpected segment interface '{segment}' in tenant '{tenant}'")]
    UnexpectedSegment { tenant: String, segment: String },

    #[error("CIDR mismatch for {tenant}/{segment}: expected {expected:?}, got {actual:?}")]
    CidrMismatch {
        tenant: String,
        segment: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Peering mismatch for tenant '{tenant}': expected {expected}")]
    PeeringMismatch { tenant: String, expected: &'static str },

    #[error("Expected {expected} topology writes, found {actual}: {requests:?}")]
    WriteCountMismatch {
        expected: usize,
        actual: usize,
        requests: Vec<String>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Fabric state verifier
pub struct FabricVerifier<'a> {
    fabric: &'a MemoryFabric,
}

impl<'a> FabricVerifier<'a> {
    /// Create a new verifier
    pub fn new(fabric: &'a MemoryFabric) -> Self {
        Self { fabric }
    }

    /// Verify that a segment interface exists
    pub fn assert_segment_exists(&self, tenant: &str, segment: &str) -> VerifyResult<()> {
        match self.fabric.cidrs(tenant, segment) {
            Some(_) => Ok(()),
            None => Err(VerificationError::SegmentNotFound {
                tenant: tenant.to_string(),
                segment: segment.to_string(),
            }),
        }
    }

    /// Verify that a segment interface does not exist
    pub fn assert_segment_absent(&self, tenant: &str, segment: &str) -> VerifyResult<()> {
        match self.fabric.cidrs(tenant, segment) {
            Some(_) => Err(VerificationError::UnexpectedSegment {
                tenant: tenant.to_string(),
                segment: segment.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verify the exact CIDR bindings of a segment interface
    pub fn assert_cidrs(&self, tenant: &str, segment: &str, expected: &[&str]) -> VerifyResult<()> {
        let actual = self.fabric.cidrs(tenant, segment).ok_or_else(|| {
            VerificationError::SegmentNotFound {
                tenant: tenant.to_string(),
                segment: segment.to_string(),
            }
        })?;
        if actual != expected {
            return Err(VerificationError::CidrMismatch {
                tenant: tenant.to_string(),
                segment: segment.to_string(),
                expected: expected.iter().map(|c| c.to_string()).collect(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify both peering interfaces and the default route are installed
    pub fn assert_peered(&self, tenant: &str) -> VerifyResult<()> {
        if self.is_peered(tenant) {
            Ok(())
        } else {
            Err(VerificationError::PeeringMismatch {
                tenant: tenant.to_string(),
                expected: "peered",
            })
        }
    }

    /// Verify no peering interface or default route remains
    pub fn assert_unpeered(&self, tenant: &str) -> VerifyResult<()> {
        let any_left = self.fabric.has_default_route(tenant)
            || !self.fabric.tenant_interfaces(tenant).is_empty()
            || self.system_peers_with(tenant);
        if any_left {
            Err(VerificationError::PeeringMismatch {
                tenant: tenant.to_string(),
                expected: "unpeered",
            })
        } else {
            Ok(())
        }
    }

    /// Verify the number of topology writes received
    pub fn assert_write_count(&self, expected: usize) -> VerifyResult<()> {
        let writes = self.fabric.topology_writes();
        if writes.len() != expected {
            return Err(VerificationError::WriteCountMismatch {
                expected,
                actual: writes.len(),
                requests: writes
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.url))
                    .collect(),
            });
        }
        Ok(())
    }

    fn is_peered(&self, tenant: &str) -> bool {
        self.fabric.has_default_route(tenant)
            && self
                .fabric
                .tenant_interfaces(tenant)
                .iter()
                .any(|r| r == SYSTEM_TENANT)
            && self.system_peers_with(tenant)
    }

    fn system_peers_with(&self, tenant: &str) -> bool {
        self.fabric
            .tenant_interfaces(SYSTEM_TENANT)
            .iter()
            .any(|r| r == tenant)
    }
}
