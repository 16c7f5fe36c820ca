//! Identity service client (Keystone API v2.0).
//!
//! Resolves project ids to display names and issues tokens for the
//! registry client. Only v2.0 is supported; a v3 endpoint is rejected
//! when the client is built.
//!
//! A token is reused until shortly before the expiry Keystone reports for
//! it. Tokens issued without an expiry are never reused.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use l3pe_fabric_client::TransportOptions;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};

/// Header carrying a Keystone token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// A cached token is dropped this long before Keystone expires it.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Resolves project ids to display names.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Returns every project as `id -> display name`.
    async fn list_projects(&self) -> SyncResult<BTreeMap<String, String>>;
}

/// Issues tokens for other OpenStack API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> SyncResult<String>;

    /// Forgets any cached token after a caller saw it rejected.
    fn invalidate(&self) {}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    id: String,
    expires: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) < self.expires
    }
}

#[derive(Debug, Deserialize)]
struct TenantsResponse {
    tenants: Vec<KeystoneTenant>,
}

#[derive(Debug, Deserialize)]
struct KeystoneTenant {
    id: String,
    #[serde(default)]
    name: String,
}

/// Keystone v2.0 client.
pub struct KeystoneClient {
    auth_url: String,
    username: String,
    password: String,
    tenant_name: String,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for KeystoneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoneClient")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("tenant_name", &self.tenant_name)
            .finish_non_exhaustive()
    }
}

impl KeystoneClient {
    /// Creates a client for `auth_url`.
    ///
    /// Fails with a configuration error if the URL does not parse or its
    /// path names the v3 API.
    pub fn new(
        auth_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        tenant_name: impl Into<String>,
        options: &TransportOptions,
    ) -> SyncResult<Self> {
        let parsed = Url::parse(auth_url)
            .map_err(|e| SyncError::config("identity.auth_url", e.to_string()))?;
        if parsed.path().contains("/v3") {
            return Err(SyncError::config(
                "identity.auth_url",
                "keystone API v3 is not supported",
            ));
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout)
            .build()
            .map_err(|e| SyncError::identity(e.to_string()))?;

        Ok(Self {
            auth_url: auth_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            tenant_name: tenant_name.into(),
            client,
            cached: Mutex::new(None),
        })
    }

    /// Authenticates and returns a fresh token id.
    ///
    /// The token is cached for [`TokenProvider::token`] when Keystone
    /// reports its expiry.
    #[instrument(skip(self), fields(auth_url = %self.auth_url))]
    pub async fn authenticate(&self) -> SyncResult<String> {
        let url = format!("{}/tokens", self.auth_url);
        let body = json!({
            "auth": {
                "passwordCredentials": {
                    "username": self.username,
                    "password": self.password,
                },
                "tenantName": self.tenant_name,
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::identity(format!("POST {}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::identity(format!(
                "POST {} returned {}: {}",
                url, status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::identity(format!("invalid token response: {}", e)))?;
        let Token { id, expires } = token.access.token;
        debug!(?expires, "Keystone token issued");
        *self.cached.lock() = expires.map(|expires| CachedToken {
            id: id.clone(),
            expires,
        });
        Ok(id)
    }
}

#[async_trait]
impl TokenProvider for KeystoneClient {
    async fn token(&self) -> SyncResult<String> {
        let cached = self.cached.lock().clone();
        match cached {
            Some(cached) if cached.is_fresh(Utc::now()) => Ok(cached.id),
            _ => self.authenticate().await,
        }
    }

    fn invalidate(&self) {
        self.cached.lock().take();
    }
}

#[async_trait]
impl IdentityLookup for KeystoneClient {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> SyncResult<BTreeMap<String, String>> {
        let token = self.token().await?;
        let url = format!("{}/tenants", self.auth_url);

        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| SyncError::identity(format!("GET {}: {}", url, e)))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate();
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::identity(format!(
                "GET {} returned {}: {}",
                url, status, text
            )));
        }

        let tenants: TenantsResponse = response
            .json()
            .await
            .map_err(|e| SyncError::identity(format!("invalid tenants response: {}", e)))?;
        debug!(count = tenants.tenants.len(), "Listed identity projects");
        Ok(tenants
            .tenants
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect())
    }
}
