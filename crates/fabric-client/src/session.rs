//! Authenticated session against the fabric controller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{FabricError, FabricResult};
use crate::paths::FabricPath;
use crate::transport::{FabricRequest, FabricResponse, FabricTransport, Method};

/// Login endpoint relative to the API root.
pub const LOGIN_PATH: &str = "/auth/login";

/// Credentials and endpoint of a fabric controller.
#[derive(Clone)]
pub struct FabricCredentials {
    /// API root, e.g. `https://controller:8443/api/v1`.
    pub api_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for FabricCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricCredentials")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FabricCredentials {
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_cookie: String,
}

/// Session-authenticated client for the fabric controller.
///
/// The session cookie is owned by this value and only changes through
/// [`renew_session`](Self::renew_session) and
/// [`close`](Self::close). A session must not be shared between
/// concurrent synchronization passes; callers hold it by `&mut`.
pub struct FabricSession {
    credentials: FabricCredentials,
    transport: Arc<dyn FabricTransport>,
    session_cookie: Option<String>,
}

impl FabricSession {
    pub fn new(credentials: FabricCredentials, transport: Arc<dyn FabricTransport>) -> Self {
        let credentials = FabricCredentials {
            api_url: credentials.api_url.trim_end_matches('/').to_string(),
            ..credentials
        };
        Self {
            credentials,
            transport,
            session_cookie: None,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.credentials.api_url
    }

    /// Returns true while a session cookie is held.
    pub fn has_session(&self) -> bool {
        self.session_cookie.is_some()
    }

    /// Replaces the current session with a freshly authenticated one.
    ///
    /// An existing session is destroyed first on a best-effort basis.
    #[instrument(skip(self), fields(api_url = %self.credentials.api_url))]
    pub async fn renew_session(&mut self) -> FabricResult<()> {
        self.close().await;

        let url = format!("{}{}", self.credentials.api_url, LOGIN_PATH);
        let body = json!({
            "password": self.credentials.password,
            "user": self.credentials.username,
        });
        let response = self
            .send(Method::Post, url, None, body.to_string(), None)
            .await?;

        let login: LoginResponse = serde_json::from_str(&response.body)
            .map_err(|e| FabricError::invalid_response("login", e))?;
        self.session_cookie = Some(login.session_cookie);
        debug!("Fabric session renewed");
        Ok(())
    }

    /// Destroys the current session on the controller, if any.
    ///
    /// Failures are logged and swallowed; the local cookie is always
    /// cleared.
    pub async fn close(&mut self) {
        let Some(token) = self.session_cookie.take() else {
            return;
        };

        let path = FabricPath::aaa_session(token.as_str());
        let url = self.url_for(&path);
        if let Err(e) = self
            .send(Method::Delete, url, Some(path), "{}".to_string(), Some(token))
            .await
        {
            debug!(error = %e, "Ignoring failure while destroying fabric session");
        }
    }

    /// Issues `method` on `path` with `body`, attaching the session cookie.
    ///
    /// Any status outside 200-299 is returned as
    /// [`FabricError::RequestFailed`]; nothing is retried.
    pub async fn request(
        &self,
        path: &FabricPath,
        body: &Value,
        method: Method,
    ) -> FabricResult<(u16, String)> {
        let url = self.url_for(path);
        let response = self
            .send(
                method,
                url,
                Some(path.clone()),
                body.to_string(),
                self.session_cookie.clone(),
            )
            .await?;
        Ok((response.status, response.body))
    }

    /// Issues a `GET` and decodes the JSON body.
    pub async fn get_json<T>(&self, path: &FabricPath) -> FabricResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let (_, body) = self.request(path, &json!({}), Method::Get).await?;
        serde_json::from_str(&body).map_err(|e| FabricError::invalid_response(path.to_string(), e))
    }

    fn url_for(&self, path: &FabricPath) -> String {
        format!("{}{}", self.credentials.api_url, path.encoded())
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        path: Option<FabricPath>,
        body: String,
        session_cookie: Option<String>,
    ) -> FabricResult<FabricResponse> {
        debug!(method = %method, url = %url, "Fabric request");

        let request = FabricRequest {
            method,
            url: url.clone(),
            path,
            body,
            session_cookie,
        };
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(FabricError::request_failed(
                response.status,
                method.as_str(),
                url,
                response.body,
            ));
        }
        Ok(response)
    }
}
