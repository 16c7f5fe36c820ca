//! Transport abstraction for fabric REST calls.
//!
//! [`FabricSession`](crate::FabricSession) builds requests and enforces the
//! status contract; a [`FabricTransport`] only moves bytes. The production
//! implementation is [`HttpTransport`] over `reqwest`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use tracing::debug;

use crate::error::{FabricError, FabricResult};
use crate::paths::FabricPath;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP verb of a fabric request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Returns true for verbs that change controller state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Method::Put | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single request to the controller.
#[derive(Debug, Clone)]
pub struct FabricRequest {
    pub method: Method,
    /// Fully built URL.
    pub url: String,
    /// The addressed resource, `None` for the login endpoint.
    pub path: Option<FabricPath>,
    /// JSON body.
    pub body: String,
    /// Session cookie to attach.
    pub session_cookie: Option<String>,
}

/// Raw controller response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricResponse {
    pub status: u16,
    pub body: String,
}

impl FabricResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 200-299.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves a request to the controller and returns whatever it answered.
///
/// Implementations return `Ok` for every response, whatever its status;
/// `Err` is reserved for calls that produced no response at all.
#[async_trait]
pub trait FabricTransport: Send + Sync {
    async fn send(&self, request: FabricRequest) -> FabricResult<FabricResponse>;
}

/// Options for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Verify the controller certificate.
    pub verify_tls: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// `reqwest` backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> FabricResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout)
            .build()
            .map_err(|e| FabricError::transport("BUILD", "-", e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FabricTransport for HttpTransport {
    async fn send(&self, request: FabricRequest) -> FabricResult<FabricResponse> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body);
        if let Some(cookie) = &request.session_cookie {
            builder = builder.header(COOKIE, format!("session_cookie={}", cookie));
        }

        let response = builder.send().await.map_err(|e| {
            FabricError::transport(request.method.as_str(), &request.url, e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            FabricError::transport(request.method.as_str(), &request.url, e.to_string())
        })?;

        debug!(status, body = %body, "Fabric response");
        Ok(FabricResponse { status, body })
    }
}
