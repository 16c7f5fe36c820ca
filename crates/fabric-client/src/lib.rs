//! REST client for the physical fabric controller.
//!
//! The controller exposes a stateful, session-authenticated REST API in
//! which every object is addressed by a key-expression path. This crate
//! provides:
//!
//! - [`FabricSession`]: session lifecycle (login, destroy) and the
//!   request contract (any non-2xx status is a [`FabricError`])
//! - [`topology`]: tenant router operations built on the session
//!   (create/delete network, create/update/delete subnet)
//! - [`FabricPath`]: typed resource locators and their encoding
//! - [`types`]: serde models of the controller's JSON documents
//! - [`FabricTransport`]: the byte-moving seam, with [`HttpTransport`]
//!   over `reqwest` for production
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use l3pe_fabric_client::{FabricCredentials, FabricSession, HttpTransport, TransportOptions};
//!
//! let transport = Arc::new(HttpTransport::new(&TransportOptions::default())?);
//! let mut session = FabricSession::new(
//!     FabricCredentials {
//!         api_url: "https://controller:8443/api/v1".into(),
//!         username: "admin".into(),
//!         password: "secret".into(),
//!     },
//!     transport,
//! );
//! session.create_network("P1.dc1", "net1").await?;
//! session.create_subnet("P1.dc1", "net1", "10.0.0.1/24").await?;
//! session.close().await;
//! ```

pub mod error;
pub mod paths;
pub mod session;
pub mod topology;
pub mod transport;
pub mod types;

pub use error::{FabricError, FabricResult};
pub use paths::{FabricPath, SYSTEM_TENANT};
pub use session::{FabricCredentials, FabricSession};
pub use transport::{
    FabricRequest, FabricResponse, FabricTransport, HttpTransport, Method, TransportOptions,
};
pub use types::{IpSubnet, LogicalRouter, SegmentInterface, StaticRoute, Tenant, TenantInterface};
