//! In-memory fabric controller
//!
//! Implements [`FabricTransport`] by interpreting each request's
//! [`FabricPath`] against a tenant tree held in memory. Sessions, request
//! logging and failure injection follow the controller's REST contract
//! closely enough to drive full synchronization passes.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use l3pe_fabric_client::paths::DEFAULT_ROUTE;
use l3pe_fabric_client::session::LOGIN_PATH;
use l3pe_fabric_client::{
    FabricPath, FabricRequest, FabricResponse, FabricResult, FabricTransport, LogicalRouter,
    Method, SegmentInterface, StaticRoute, Tenant, TenantInterface,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Router state of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RouterState {
    tenant_interfaces: BTreeSet<String>,
    /// segment name -> bound CIDRs, in insertion order
    segments: BTreeMap<String, Vec<String>>,
    default_route: bool,
}

impl RouterState {
    fn from_tenant(tenant: &Tenant) -> Self {
        let mut state = Self::default();
        let Some(router) = &tenant.logical_router else {
            return state;
        };
        for interface in router.tenant_interfaces.iter().flatten() {
            state.tenant_interfaces.insert(interface.remote_tenant.clone());
        }
        for segment in router.segment_interfaces.iter().flatten() {
            state.segments.insert(
                segment.segment.clone(),
                segment.cidrs().map(str::to_string).collect(),
            );
        }
        state.default_route = router
            .static_routes
            .iter()
            .flatten()
            .any(|r| r.dst_ip_subnet == DEFAULT_ROUTE);
        state
    }

    fn segment_interfaces(&self) -> Vec<SegmentInterface> {
        self.segments
            .iter()
            .map(|(name, cidrs)| {
                cidrs
                    .iter()
                    .fold(SegmentInterface::new(name.clone()), |si, c| {
                        si.with_cidr(c.clone())
                    })
            })
            .collect()
    }

    fn tenant_interfaces(&self) -> Vec<TenantInterface> {
        self.tenant_interfaces
            .iter()
            .map(|r| TenantInterface::new(r.clone()))
            .collect()
    }

    /// Renders the router; keys are present only when non-empty.
    fn render(&self) -> Option<LogicalRouter> {
        let router = LogicalRouter {
            tenant_interfaces: Some(self.tenant_interfaces()).filter(|v| !v.is_empty()),
            segment_interfaces: Some(self.segment_interfaces()).filter(|v| !v.is_empty()),
            static_routes: self.default_route.then(|| {
                vec![StaticRoute {
                    dst_ip_subnet: DEFAULT_ROUTE.to_string(),
                    next_hop: None,
                }]
            }),
        };
        if router == LogicalRouter::default() {
            None
        } else {
            Some(router)
        }
    }
}

/// An injected failure: requests with `method` whose rendered path
/// contains `path_fragment` answer `status`.
#[derive(Debug, Clone)]
struct Failure {
    method: Method,
    path_fragment: String,
    status: u16,
}

#[derive(Debug, Default)]
struct State {
    tenants: BTreeMap<String, RouterState>,
    sessions: BTreeSet<String>,
    next_token: u64,
    requests: Vec<FabricRequest>,
    failures: Vec<Failure>,
}

#[derive(Deserialize)]
struct LoginBody {
    user: String,
    password: String,
}

#[derive(Deserialize)]
struct IpCidrBody {
    #[serde(rename = "ip-cidr")]
    ip_cidr: String,
}

/// In-memory fabric controller.
#[derive(Debug)]
pub struct MemoryFabric {
    username: String,
    password: String,
    state: Mutex<State>,
}

impl Default for MemoryFabric {
    fn default() -> Self {
        Self::new("admin", "admin")
    }
}

impl MemoryFabric {
    /// Create an empty controller accepting the given credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Seed a tenant document, replacing any existing tenant of that name
    pub fn insert_tenant(&self, tenant: &Tenant) {
        self.state
            .lock()
            .tenants
            .insert(tenant.name.clone(), RouterState::from_tenant(tenant));
    }

    /// Seed a tenant together with the `system` side peering towards it
    pub fn insert_peered_tenant(&self, tenant: &Tenant) {
        self.insert_tenant(tenant);
        self.add_system_interface(&tenant.name);
    }

    /// Seed a `system` tenant interface towards `remote`
    pub fn add_system_interface(&self, remote: &str) {
        self.state
            .lock()
            .tenants
            .entry(l3pe_fabric_client::SYSTEM_TENANT.to_string())
            .or_default()
            .tenant_interfaces
            .insert(remote.to_string());
    }

    /// Current tenant document, if the tenant exists
    pub fn tenant(&self, name: &str) -> Option<Tenant> {
        let state = self.state.lock();
        state.tenants.get(name).map(|router| Tenant {
            name: name.to_string(),
            logical_router: router.render(),
        })
    }

    /// CIDRs bound to a segment interface, `None` if the segment is absent
    pub fn cidrs(&self, tenant: &str, segment: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .tenants
            .get(tenant)
            .and_then(|r| r.segments.get(segment))
            .cloned()
    }

    /// Remote tenants peered from `tenant`
    pub fn tenant_interfaces(&self, tenant: &str) -> Vec<String> {
        self.state
            .lock()
            .tenants
            .get(tenant)
            .map(|r| r.tenant_interfaces.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `tenant` has the default route
    pub fn has_default_route(&self, tenant: &str) -> bool {
        self.state
            .lock()
            .tenants
            .get(tenant)
            .is_some_and(|r| r.default_route)
    }

    /// Number of live sessions
    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Make matching requests fail with `status` until cleared
    pub fn fail_when(&self, method: Method, path_fragment: impl Into<String>, status: u16) {
        self.state.lock().failures.push(Failure {
            method,
            path_fragment: path_fragment.into(),
            status,
        });
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<FabricRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests that changed (or tried to change) tenant topology.
    ///
    /// Session login and teardown are not counted.
    pub fn topology_writes(&self) -> Vec<FabricRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method.is_mutating())
            .filter(|r| !matches!(r.path, None | Some(FabricPath::AaaSession { .. })))
            .cloned()
            .collect()
    }

    /// Forget the request log
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn handle(&self, request: &FabricRequest) -> FabricResponse {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let Some(path) = &request.path else {
            return Self::login(&mut state, request, &self.username, &self.password);
        };

        let rendered = path.to_string();
        if let Some(failure) = state
            .failures
            .iter()
            .find(|f| f.method == request.method && rendered.contains(&f.path_fragment))
        {
            return FabricResponse::new(failure.status, "injected failure");
        }

        if let FabricPath::AaaSession { token } = path {
            return if request.method == Method::Delete && state.sessions.remove(token) {
                FabricResponse::new(200, "{}")
            } else {
                FabricResponse::new(404, "no such session")
            };
        }

        let authorized = request
            .session_cookie
            .as_ref()
            .is_some_and(|c| state.sessions.contains(c));
        if !authorized {
            return FabricResponse::new(401, "session required");
        }

        match request.method {
            Method::Get => Self::read(&state, path),
            Method::Put => Self::write(&mut state, path, &request.body),
            Method::Delete => Self::remove(&mut state, path),
            Method::Post => FabricResponse::new(405, "method not allowed"),
        }
    }

    fn login(
        state: &mut State,
        request: &FabricRequest,
        username: &str,
        password: &str,
    ) -> FabricResponse {
        if request.method != Method::Post || !request.url.ends_with(LOGIN_PATH) {
            return FabricResponse::new(404, "not found");
        }
        let Ok(body) = serde_json::from_str::<LoginBody>(&request.body) else {
            return FabricResponse::new(400, "malformed login");
        };
        if body.user != username || body.password != password {
            return FabricResponse::new(401, "bad credentials");
        }

        state.next_token += 1;
        let token = format!("token-{}", state.next_token);
        state.sessions.insert(token.clone());
        FabricResponse::new(200, json!({ "session_cookie": token }).to_string())
    }

    fn read(state: &State, path: &FabricPath) -> FabricResponse {
        let value: Value = match path {
            FabricPath::Tenants => json!(state
                .tenants
                .iter()
                .map(|(name, router)| Tenant {
                    name: name.clone(),
                    logical_router: router.render(),
                })
                .collect::<Vec<_>>()),
            FabricPath::TenantInterfaces { tenant } => json!(state
                .tenants
                .get(tenant)
                .map(RouterState::tenant_interfaces)
                .unwrap_or_default()),
            FabricPath::SegmentInterfaces { tenant } => json!(state
                .tenants
                .get(tenant)
                .map(RouterState::segment_interfaces)
                .unwrap_or_default()),
            _ => return FabricResponse::new(405, "unsupported read"),
        };
        FabricResponse::new(200, value.to_string())
    }

    fn write(state: &mut State, path: &FabricPath, body: &str) -> FabricResponse {
        match path {
            FabricPath::TenantInterface { tenant, remote } => {
                state
                    .tenants
                    .entry(tenant.clone())
                    .or_default()
                    .tenant_interfaces
                    .insert(remote.clone());
            }
            FabricPath::StaticRoute { tenant } => {
                state.tenants.entry(tenant.clone()).or_default().default_route = true;
            }
            FabricPath::SegmentInterface { tenant, segment } => {
                state
                    .tenants
                    .entry(tenant.clone())
                    .or_default()
                    .segments
                    .entry(segment.clone())
                    .or_default();
            }
            FabricPath::IpSubnet {
                tenant,
                segment,
                cidr,
            } => {
                let Ok(body) = serde_json::from_str::<IpCidrBody>(body) else {
                    return FabricResponse::new(400, "missing ip-cidr");
                };
                let Some(cidrs) = state
                    .tenants
                    .get_mut(tenant)
                    .and_then(|r| r.segments.get_mut(segment))
                else {
                    return FabricResponse::new(404, "no such segment interface");
                };
                match cidrs.iter().position(|c| c == cidr) {
                    Some(index) => cidrs[index] = body.ip_cidr,
                    None => cidrs.push(body.ip_cidr),
                }
                cidrs.dedup();
            }
            _ => return FabricResponse::new(405, "unsupported write"),
        }
        debug!(path = %path, "Memory fabric write");
        FabricResponse::new(204, "")
    }

    fn remove(state: &mut State, path: &FabricPath) -> FabricResponse {
        match path {
            FabricPath::TenantInterface { tenant, remote } => {
                if let Some(router) = state.tenants.get_mut(tenant) {
                    router.tenant_interfaces.remove(remote);
                }
            }
            FabricPath::StaticRoute { tenant } => {
                if let Some(router) = state.tenants.get_mut(tenant) {
                    router.default_route = false;
                }
            }
            FabricPath::SegmentInterface { tenant, segment } => {
                if let Some(router) = state.tenants.get_mut(tenant) {
                    router.segments.remove(segment);
                }
            }
            FabricPath::IpSubnet {
                tenant,
                segment,
                cidr,
            } => {
                if let Some(cidrs) = state
                    .tenants
                    .get_mut(tenant)
                    .and_then(|r| r.segments.get_mut(segment))
                {
                    cidrs.retain(|c| c != cidr);
                }
            }
            _ => return FabricResponse::new(405, "unsupported delete"),
        }
        debug!(path = %path, "Memory fabric delete");
        FabricResponse::new(204, "")
    }
}

#[async_trait]
impl FabricTransport for MemoryFabric {
    async fn send(&self, request: FabricRequest) -> FabricResult<FabricResponse> {
        Ok(self.handle(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TenantFixture;
    use l3pe_fabric_client::{FabricCredentials, FabricSession};
    use std::sync::Arc;

    fn session(fabric: &Arc<MemoryFabric>) -> FabricSession {
        FabricSession::new(
            FabricCredentials {
                api_url: "https://fabric.test/api/v1".to_string(),
                username: "admin".to_string(),
                password: "admin".to_string(),
            },
            fabric.clone(),
        )
    }

    #[tokio::test]
    async fn test_create_network_builds_peering() {
        let fabric = Arc::new(MemoryFabric::default());
        let mut session = session(&fabric);

        session.create_network("P1.dc1", "net1").await.unwrap();

        assert_eq!(fabric.cidrs("P1.dc1", "net1"), Some(vec![]));
        assert_eq!(fabric.tenant_interfaces("P1.dc1"), vec!["system"]);
        assert_eq!(fabric.tenant_interfaces("system"), vec!["P1.dc1"]);
        assert!(fabric.has_default_route("P1.dc1"));
        assert_eq!(fabric.topology_writes().len(), 4);
    }

    #[tokio::test]
    async fn test_update_subnet_rewrites_in_place() {
        let fabric = Arc::new(MemoryFabric::default());
        fabric.insert_peered_tenant(
            &TenantFixture::new("P1.dc1")
                .segment("net1", &["10.0.0.1/24"])
                .build(),
        );
        let mut session = session(&fabric);

        session
            .update_subnet("P1.dc1", "net1", Some("10.0.0.1/24"), "10.0.0.2/24")
            .await
            .unwrap();

        assert_eq!(
            fabric.cidrs("P1.dc1", "net1"),
            Some(vec!["10.0.0.2/24".to_string()])
        );
    }

    #[tokio::test]
    async fn test_delete_last_network_cascades() {
        let fabric = Arc::new(MemoryFabric::default());
        fabric.insert_peered_tenant(
            &TenantFixture::new("P1.dc1")
                .segment("net1", &[])
                .segment("net2", &[])
                .build(),
        );
        let mut session = session(&fabric);

        session.delete_network("P1.dc1", "net1").await.unwrap();
        assert!(fabric.has_default_route("P1.dc1"));
        assert_eq!(fabric.tenant_interfaces("system"), vec!["P1.dc1"]);

        session.delete_network("P1.dc1", "net2").await.unwrap();
        assert!(!fabric.has_default_route("P1.dc1"));
        assert!(fabric.tenant_interfaces("P1.dc1").is_empty());
        assert!(fabric.tenant_interfaces("system").is_empty());
    }

    #[tokio::test]
    async fn test_renew_destroys_previous_session() {
        let fabric = Arc::new(MemoryFabric::default());
        let mut session = session(&fabric);

        session.renew_session().await.unwrap();
        session.renew_session().await.unwrap();
        assert_eq!(fabric.live_sessions(), 1);

        session.close().await;
        assert_eq!(fabric.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_requests_without_session_are_rejected() {
        let fabric = Arc::new(MemoryFabric::default());
        let session = session(&fabric);

        let err = session.list_tenants("dc1").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let fabric = Arc::new(MemoryFabric::default());
        fabric.fail_when(Method::Put, "segment-interface", 500);
        let mut session = session(&fabric);

        let err = session.create_network("P1.dc1", "net1").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(fabric.cidrs("P1.dc1", "net1"), None);

        fabric.clear_failures();
        session.create_network("P1.dc1", "net1").await.unwrap();
        assert_eq!(fabric.cidrs("P1.dc1", "net1"), Some(vec![]));
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let fabric = Arc::new(MemoryFabric::new("admin", "other"));
        let mut session = session(&fabric);

        let err = tokio_test::block_on(session.renew_session()).unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(fabric.live_sessions(), 0);
    }

    #[test]
    fn test_half_formed_router_renders_without_segment_key() {
        let fabric = MemoryFabric::default();
        fabric.add_system_interface("P1.dc1");
        let system = fabric.tenant("system").unwrap();
        assert!(system.segment_interfaces().is_none());
    }
}
