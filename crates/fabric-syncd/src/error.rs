//! Error types for the fabric synchronizer.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;

use l3pe_fabric_client::FabricError;
use thiserror::Error;

/// Result type alias for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can abort a synchronization pass or daemon startup.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A fabric call failed outside an operation batch.
    #[error(transparent)]
    Fabric(#[from] FabricError),

    /// Upstream registry data cannot be mapped onto the fabric.
    #[error("Invalid {entity} '{id}': {message}")]
    Validation {
        /// Kind of record (e.g. "subnet", "tenant").
        entity: String,
        /// Identifier of the record.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// An operation batch stopped at its first failing call.
    ///
    /// Operations applied before the failure are kept on the fabric.
    #[error("Applying {category} stopped after {applied} operation(s): {source}")]
    PartialApply {
        /// Batch category (e.g. "create_network").
        category: String,
        /// Number of operations applied before the failure.
        applied: usize,
        /// The failing call.
        #[source]
        source: FabricError,
    },

    /// The identity service could not be queried.
    #[error("Identity service error: {message}")]
    Identity {
        /// Error message.
        message: String,
    },

    /// The registry could not be queried.
    #[error("Registry error: {message}")]
    Registry {
        /// Error message.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    Config {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// I/O failure (config file, listener socket).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Creates a validation error.
    pub fn validation(
        entity: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity: entity.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a partial apply error.
    pub fn partial_apply(category: impl Into<String>, applied: usize, source: FabricError) -> Self {
        Self::PartialApply {
            category: category.into(),
            applied,
            source,
        }
    }

    /// Creates an identity service error.
    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity {
            message: message.into(),
        }
    }

    /// Creates a registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if the next scheduled pass may succeed without
    /// operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Fabric(e) => e.is_retryable(),
            SyncError::PartialApply { source, .. } => source.is_retryable(),
            SyncError::Identity { .. } | SyncError::Registry { .. } | SyncError::Io(_) => true,
            SyncError::Validation { .. } | SyncError::Config { .. } => false,
        }
    }
}
