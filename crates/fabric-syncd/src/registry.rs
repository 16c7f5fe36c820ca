//! Registry (Neutron) reader and the desired-state snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use l3pe_fabric_client::TransportOptions;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};
use crate::identity::{IdentityLookup, TokenProvider, AUTH_TOKEN_HEADER};
use crate::model::{Network, Subnet};

/// Reads networks and subnets from the registry.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn list_networks(&self) -> SyncResult<Vec<Network>>;
    async fn list_subnets(&self) -> SyncResult<Vec<Subnet>>;
}

#[derive(Debug, Deserialize)]
struct NetworksResponse {
    networks: Vec<NeutronNetwork>,
}

#[derive(Debug, Deserialize)]
struct NeutronNetwork {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tenant_id: String,
    #[serde(rename = "provider:physical_network", default)]
    physical_network: Option<String>,
    #[serde(default)]
    segments: Vec<NeutronSegment>,
}

#[derive(Debug, Deserialize)]
struct NeutronSegment {
    #[serde(rename = "provider:physical_network", default)]
    physical_network: Option<String>,
}

impl From<NeutronNetwork> for Network {
    fn from(n: NeutronNetwork) -> Self {
        let physical_networks = n
            .physical_network
            .into_iter()
            .chain(n.segments.into_iter().filter_map(|s| s.physical_network))
            .collect();
        Network {
            id: n.id,
            name: n.name,
            tenant_id: n.tenant_id,
            physical_networks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubnetsResponse {
    subnets: Vec<NeutronSubnet>,
}

#[derive(Debug, Deserialize)]
struct NeutronSubnet {
    id: String,
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    network_id: String,
    #[serde(default)]
    cidr: Option<String>,
    #[serde(default)]
    gateway_ip: Option<String>,
}

impl From<NeutronSubnet> for Subnet {
    fn from(s: NeutronSubnet) -> Self {
        Subnet {
            id: s.id,
            tenant_id: s.tenant_id,
            network_id: s.network_id,
            cidr: s.cidr,
            gateway_ip: s.gateway_ip,
        }
    }
}

/// Neutron v2.0 REST client.
pub struct NeutronClient {
    neutron_url: String,
    tokens: Arc<dyn TokenProvider>,
    client: Client,
}

impl NeutronClient {
    pub fn new(
        neutron_url: &str,
        tokens: Arc<dyn TokenProvider>,
        options: &TransportOptions,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout)
            .build()
            .map_err(|e| SyncError::registry(e.to_string()))?;
        Ok(Self {
            neutron_url: neutron_url.trim_end_matches('/').to_string(),
            tokens,
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str) -> SyncResult<T> {
        let token = self.tokens.token().await?;
        let url = format!("{}/v2.0/{}", self.neutron_url, resource);
        debug!(url = %url, "Registry request");

        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| SyncError::registry(format!("GET {}: {}", url, e)))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate();
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::registry(format!(
                "GET {} returned {}: {}",
                url, status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::registry(format!("invalid {} response: {}", resource, e)))
    }
}

#[async_trait]
impl RegistryReader for NeutronClient {
    #[instrument(skip(self))]
    async fn list_networks(&self) -> SyncResult<Vec<Network>> {
        let response: NetworksResponse = self.get("networks").await?;
        Ok(response.networks.into_iter().map(Network::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_subnets(&self) -> SyncResult<Vec<Subnet>> {
        let response: SubnetsResponse = self.get("subnets").await?;
        Ok(response.subnets.into_iter().map(Subnet::from).collect())
    }
}

/// Desired state for one pass.
///
/// Networks carrying an excluded physical network tag, and their subnets,
/// are removed from `networks`/`subnets`; the excluded networks are kept in
/// `excluded_networks` so their fabric segments are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Project id -> display name.
    pub projects: BTreeMap<String, String>,
    pub networks: Vec<Network>,
    pub subnets: Vec<Subnet>,
    pub excluded_networks: Vec<Network>,
}

impl RegistrySnapshot {
    /// Reads projects, networks and subnets.
    pub async fn load(
        identity: &dyn IdentityLookup,
        registry: &dyn RegistryReader,
        excludes: &[String],
    ) -> SyncResult<Self> {
        let projects = identity.list_projects().await?;
        let networks = registry.list_networks().await?;
        let subnets = registry.list_subnets().await?;
        Ok(Self::from_parts(projects, networks, subnets, excludes))
    }

    /// Builds a snapshot, splitting off excluded networks.
    pub fn from_parts(
        projects: BTreeMap<String, String>,
        networks: Vec<Network>,
        subnets: Vec<Subnet>,
        excludes: &[String],
    ) -> Self {
        let (excluded_networks, networks): (Vec<_>, Vec<_>) =
            networks.into_iter().partition(|n| n.is_excluded(excludes));
        let subnets = subnets
            .into_iter()
            .filter(|s| !excluded_networks.iter().any(|n| n.id == s.network_id))
            .collect();

        if !excluded_networks.is_empty() {
            debug!(
                excluded = ?excluded_networks.iter().map(|n| &n.id).collect::<Vec<_>>(),
                "Excluding networks"
            );
        }

        Self {
            projects,
            networks,
            subnets,
            excluded_networks,
        }
    }

    /// Fabric tenant name of project `tenant_id`.
    ///
    /// An unknown project or an empty display name is a validation error.
    pub fn tenant_name(&self, tenant_id: &str, deployment_id: &str) -> SyncResult<String> {
        match self.projects.get(tenant_id) {
            None => Err(SyncError::validation("tenant", tenant_id, "not found")),
            Some(name) if name.is_empty() => {
                Err(SyncError::validation("tenant", tenant_id, "name is empty"))
            }
            Some(name) => Ok(format!("{}.{}", name, deployment_id)),
        }
    }

    /// Like [`tenant_name`](Self::tenant_name) but `None` instead of an error.
    pub fn find_tenant_name(&self, tenant_id: &str, deployment_id: &str) -> Option<String> {
        self.tenant_name(tenant_id, deployment_id).ok()
    }

    /// Looks up an included network by id.
    pub fn network(&self, network_id: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.id == network_id)
    }

    /// Returns true if some project maps to fabric tenant `tenant`.
    pub fn has_tenant(&self, tenant: &str, deployment_id: &str) -> bool {
        self.projects
            .values()
            .filter(|name| !name.is_empty())
            .any(|name| format!("{}.{}", name, deployment_id) == tenant)
    }
}
