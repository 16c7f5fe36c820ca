//! Error types for fabric controller operations.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use thiserror::Error;

/// Result type alias for fabric operations.
pub type FabricResult<T> = Result<T, FabricError>;

/// Errors raised while talking to the fabric controller.
#[derive(Debug, Error)]
pub enum FabricError {
    /// The controller answered with a status outside 200-299.
    #[error("Fabric request failed: {method} {url} returned {status}: {body}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// HTTP verb of the request.
        method: String,
        /// Fully built request URL.
        url: String,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("Fabric transport error for {method} {url}: {message}")]
    Transport {
        /// HTTP verb of the request.
        method: String,
        /// Fully built request URL.
        url: String,
        /// Underlying error message.
        message: String,
    },

    /// A 2xx response body could not be decoded.
    #[error("Invalid fabric response for {context}: {source}")]
    InvalidResponse {
        /// What was being decoded.
        context: String,
        /// The JSON decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A mutating call was made with an empty argument.
    #[error("Invalid parameter for {operation}: {message}")]
    InvalidInput {
        /// Operation name (e.g. "create_network").
        operation: String,
        /// Description of the bad argument(s).
        message: String,
    },
}

impl FabricError {
    /// Creates a request failure from a non-2xx response.
    pub fn request_failed(
        status: u16,
        method: impl Into<String>,
        url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::RequestFailed {
            status,
            method: method.into(),
            url: url.into(),
            body: body.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidResponse {
            context: context.into(),
            source,
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status if the controller answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FabricError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if a later pass may succeed without operator action.
    ///
    /// Nothing is retried inside a pass; this only feeds logging.
    pub fn is_retryable(&self) -> bool {
        match self {
            FabricError::Transport { .. } => true,
            FabricError::RequestFailed { status, .. } => *status >= 500 || *status == 401,
            _ => false,
        }
    }
}
