//! Configuration file support for fabric-syncd
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/fabric-syncd/fabric-syncd.toml

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use l3pe_fabric_client::{FabricCredentials, TransportOptions};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fabric-syncd/fabric-syncd.toml";

/// Fabric controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// REST API root, e.g. https://controller:8443/api/v1
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Controller user
    #[serde(default = "default_fabric_username")]
    pub username: String,

    /// Controller password
    #[serde(default)]
    pub password: String,

    /// Verify the controller certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay after each mutating call in milliseconds
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
}

/// Identity service (Keystone v2.0) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Keystone v2.0 endpoint
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Admin user
    #[serde(default = "default_identity_username")]
    pub username: String,

    /// Admin password
    #[serde(default)]
    pub password: String,

    /// Admin tenant
    #[serde(default = "default_tenant_name")]
    pub tenant_name: String,
}

/// Registry (Neutron API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Neutron endpoint (without the /v2.0 suffix)
    #[serde(default = "default_neutron_url")]
    pub neutron_url: String,
}

/// Synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Deployment id appended to project names to form fabric tenant names
    #[serde(default)]
    pub deployment_id: String,

    /// Seconds between passes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Physical network tags whose networks are never synchronized
    #[serde(default)]
    pub exclude_physical_networks: Vec<String>,

    /// Compute operations without applying them
    #[serde(default)]
    pub dry_run: bool,

    /// Delete system tenant interfaces whose tenant is gone everywhere
    #[serde(default)]
    pub prune_orphan_tenant_interfaces: bool,
}

/// Deletion notification listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Gate deletions on received notifications
    #[serde(default)]
    pub enabled: bool,

    /// Listener bind address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

/// Complete fabric-syncd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabricSyncConfig {
    #[serde(default)]
    pub fabric: FabricConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

// Default functions
fn default_api_url() -> String {
    "https://localhost:8443/api/v1".to_string()
}

fn default_fabric_username() -> String {
    "admin".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pacing() -> u64 {
    500
}

fn default_auth_url() -> String {
    "http://localhost:35357/v2.0".to_string()
}

fn default_identity_username() -> String {
    "neutron".to_string()
}

fn default_tenant_name() -> String {
    "service".to_string()
}

fn default_neutron_url() -> String {
    "http://localhost:9696".to_string()
}

fn default_interval() -> u64 {
    600
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9697))
}

// Default implementations
impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: default_fabric_username(),
            password: String::new(),
            verify_tls: false,
            request_timeout_secs: default_request_timeout(),
            pacing_ms: default_pacing(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            username: default_identity_username(),
            password: String::new(),
            tenant_name: default_tenant_name(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            neutron_url: default_neutron_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deployment_id: String::new(),
            interval_secs: default_interval(),
            exclude_physical_networks: Vec::new(),
            dry_run: false,
            prune_orphan_tenant_interfaces: false,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

impl FabricSyncConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                SyncError::config(
                    path.display().to_string(),
                    format!("failed to parse config file: {}", e),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> SyncResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fabric.request_timeout_secs)
    }

    /// Pacing delay as Duration
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.fabric.pacing_ms)
    }

    /// Pass interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Fabric controller credentials
    pub fn fabric_credentials(&self) -> FabricCredentials {
        FabricCredentials {
            api_url: self.fabric.api_url.clone(),
            username: self.fabric.username.clone(),
            password: self.fabric.password.clone(),
        }
    }

    /// HTTP transport options shared by all clients
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            verify_tls: self.fabric.verify_tls,
            timeout: self.request_timeout(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SyncResult<()> {
        if self.fabric.api_url.trim().is_empty() {
            return Err(SyncError::config("fabric.api_url", "must not be empty"));
        }

        if self.fabric.request_timeout_secs == 0 {
            return Err(SyncError::config(
                "fabric.request_timeout_secs",
                "must be > 0",
            ));
        }

        if self.sync.deployment_id.trim().is_empty() {
            return Err(SyncError::config("sync.deployment_id", "must not be empty"));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::config("sync.interval_secs", "must be > 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> FabricSyncConfig {
        let mut config = FabricSyncConfig::default();
        config.sync.deployment_id = "dc1".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = FabricSyncConfig::default();
        assert_eq!(config.fabric.api_url, "https://localhost:8443/api/v1");
        assert!(!config.fabric.verify_tls);
        assert_eq!(config.sync.interval_secs, 600);
        assert!(config.sync.exclude_physical_networks.is_empty());
        assert!(!config.sync.dry_run);
        assert!(!config.sync.prune_orphan_tenant_interfaces);
        assert!(!config.events.enabled);
        assert_eq!(config.events.listen_addr.to_string(), "127.0.0.1:9697");
    }

    #[test]
    fn test_durations() {
        let config = FabricSyncConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.pacing(), Duration::from_millis(500));
        assert_eq!(config.interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_deployment_id() {
        let err = FabricSyncConfig::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration for sync.deployment_id: must not be empty"
        );
    }

    #[test]
    fn test_validate_accepts_fqdn_deployment_id() {
        let mut config = valid();
        config.sync.deployment_id = "neutron-ctrl01.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = valid();
        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_api_url() {
        let mut config = valid();
        config.fabric.api_url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[fabric]
api_url = "https://bcf.example:8443/api/v1"
username = "sync"
password = "secret"
pacing_ms = 0

[sync]
deployment_id = "dc1"
exclude_physical_networks = ["physnet-ext"]

[events]
enabled = true
listen_addr = "0.0.0.0:9700"
"#;
        let config: FabricSyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fabric.api_url, "https://bcf.example:8443/api/v1");
        assert_eq!(config.fabric.pacing_ms, 0);
        assert_eq!(config.sync.exclude_physical_networks, vec!["physnet-ext"]);
        assert!(config.events.enabled);
        assert_eq!(config.events.listen_addr.port(), 9700);
        // Unspecified values should use defaults
        assert_eq!(config.fabric.request_timeout_secs, 30);
        assert_eq!(config.sync.interval_secs, 600);
        assert_eq!(config.registry.neutron_url, "http://localhost:9696");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_from_config() {
        let config = valid();
        let credentials = config.fabric_credentials();
        assert_eq!(credentials.api_url, config.fabric.api_url);
        assert_eq!(credentials.username, "admin");
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = FabricSyncConfig::load_or_default("/nonexistent/path.toml").unwrap();
        assert_eq!(config.fabric.api_url, "https://localhost:8443/api/v1");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ndeployment_id = \"dc2\"\ndry_run = true").unwrap();

        let config = FabricSyncConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.sync.deployment_id, "dc2");
        assert!(config.sync.dry_run);
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync\ndeployment_id = 1").unwrap();

        let err = FabricSyncConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }
}
