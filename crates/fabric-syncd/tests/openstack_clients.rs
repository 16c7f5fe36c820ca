//! Identity and registry clients against mock OpenStack endpoints.

use std::sync::Arc;
use std::time::Duration;

use l3pe_fabric_client::TransportOptions;
use l3pe_fabric_syncd::{
    IdentityLookup, KeystoneClient, NeutronClient, RegistryReader, RegistrySnapshot, SyncError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options() -> TransportOptions {
    TransportOptions {
        verify_tls: false,
        timeout: Duration::from_secs(5),
    }
}

async fn keystone() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "passwordCredentials": {"username": "neutron", "password": "secret"},
                "tenantName": "service",
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": {"token": {"id": "ks-token"}}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tenants"))
        .and(header("X-Auth-Token", "ks-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tenants": [
                {"id": "p1", "name": "P1", "enabled": true},
                {"id": "p2", "name": "P2", "enabled": true},
            ]
        })))
        .mount(&server)
        .await;
    server
}

fn keystone_client(server: &MockServer) -> Arc<KeystoneClient> {
    Arc::new(
        KeystoneClient::new(
            &format!("{}/v2.0", server.uri()),
            "neutron",
            "secret",
            "service",
            &options(),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_keystone_lists_projects() {
    let server = keystone().await;
    let client = keystone_client(&server);

    let projects = client.list_projects().await.unwrap();

    assert_eq!(projects.len(), 2);
    assert_eq!(projects["p1"], "P1");
    assert_eq!(projects["p2"], "P2");
}

#[tokio::test]
async fn test_keystone_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;
    let client = keystone_client(&server);

    let err = client.list_projects().await.unwrap_err();

    assert!(matches!(err, SyncError::Identity { .. }));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_neutron_snapshot() {
    let identity = keystone().await;
    let neutron = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(header("X-Auth-Token", "ks-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "networks": [
                {"id": "n1", "name": "net1", "tenant_id": "p1", "provider:physical_network": "physnet1"},
                {"id": "n2", "name": "ext", "tenant_id": "p1", "segments": [
                    {"provider:physical_network": "physnet-ext"}
                ]},
            ]
        })))
        .mount(&neutron)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/subnets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subnets": [
                {"id": "s1", "tenant_id": "p1", "network_id": "n1", "cidr": "10.0.0.0/24", "gateway_ip": "10.0.0.1"},
                {"id": "s2", "tenant_id": "p1", "network_id": "n2", "cidr": "192.0.2.0/24", "gateway_ip": null},
            ]
        })))
        .mount(&neutron)
        .await;

    let keystone = keystone_client(&identity);
    let registry = NeutronClient::new(&neutron.uri(), keystone.clone(), &options()).unwrap();

    let networks = registry.list_networks().await.unwrap();
    assert_eq!(networks[0].physical_networks, vec!["physnet1"]);
    assert_eq!(networks[1].physical_networks, vec!["physnet-ext"]);

    let snapshot = RegistrySnapshot::load(
        keystone.as_ref(),
        &registry,
        &["physnet-ext".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(snapshot.networks.len(), 1);
    assert_eq!(snapshot.subnets.len(), 1);
    assert_eq!(snapshot.excluded_networks[0].name, "ext");
    assert_eq!(snapshot.tenant_name("p1", "dc1").unwrap(), "P1.dc1");
}

#[tokio::test]
async fn test_neutron_error_status() {
    let identity = keystone().await;
    let neutron = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&neutron)
        .await;
    let registry =
        NeutronClient::new(&neutron.uri(), keystone_client(&identity), &options()).unwrap();

    let err = registry.list_subnets().await.unwrap_err();

    assert!(matches!(err, SyncError::Registry { .. }));
    assert!(err.is_retryable());
}

async fn keystone_with_expiry(expires: chrono::DateTime<chrono::Utc>, logins: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {"token": {"id": "ks-token", "expires": expires.to_rfc3339()}}
        })))
        .expect(logins)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tenants"))
        .and(header("X-Auth-Token", "ks-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"tenants": [{"id": "p1", "name": "P1"}]})),
        )
        .mount(&server)
        .await;
    server
}

async fn empty_neutron() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/subnets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subnets": []})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_snapshot_logs_in_once() {
    let identity = keystone_with_expiry(chrono::Utc::now() + chrono::Duration::hours(1), 1).await;
    let neutron = empty_neutron().await;
    let keystone = keystone_client(&identity);
    let registry = NeutronClient::new(&neutron.uri(), keystone.clone(), &options()).unwrap();

    RegistrySnapshot::load(keystone.as_ref(), &registry, &[])
        .await
        .unwrap();
    RegistrySnapshot::load(keystone.as_ref(), &registry, &[])
        .await
        .unwrap();

    identity.verify().await;
}

#[tokio::test]
async fn test_expired_token_is_not_reused() {
    let identity = keystone_with_expiry(chrono::Utc::now() + chrono::Duration::seconds(30), 2).await;
    let client = keystone_client(&identity);

    client.list_projects().await.unwrap();
    client.list_projects().await.unwrap();

    identity.verify().await;
}

#[tokio::test]
async fn test_rejected_token_is_dropped() {
    let identity = keystone_with_expiry(chrono::Utc::now() + chrono::Duration::hours(1), 2).await;
    let neutron = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&neutron)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .mount(&neutron)
        .await;
    let registry =
        NeutronClient::new(&neutron.uri(), keystone_client(&identity), &options()).unwrap();

    let err = registry.list_networks().await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert!(registry.list_networks().await.unwrap().is_empty());

    identity.verify().await;
}
