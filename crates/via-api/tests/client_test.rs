// Integration tests for `ViaClient` using wiremock.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use via_api::models::{HostForm, PoolForm};
use via_api::{Error, TransportConfig, ViaClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ViaClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = ViaClient::new(base, &TransportConfig::default()).unwrap();
    (server, client)
}

fn host_json(id: i64, reimage: bool) -> serde_json::Value {
    json!({
        "id": id,
        "ip": "10.0.0.21",
        "mac": "aa:bb:cc:dd:ee:21",
        "hostname": "esx21",
        "domain": "lab.local",
        "reimage": reimage,
        "pool_id": 1,
        "group_id": 3,
        "progress": 0,
        "progresstext": "",
        "ks": ""
    })
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .and(body_json(json!({ "username": "admin", "password": "VMware1!" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/")
                .set_body_json(json!({ "message": "login successful" })),
        )
        .mount(&server)
        .await;

    client
        .login("admin", &SecretString::from("VMware1!"))
        .await
        .unwrap();

    let cookie = client.cookie_header().unwrap();
    assert!(cookie.contains("session=abc123"), "cookie was {cookie}");
}

#[tokio::test]
async fn test_list_hosts() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/addresses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([host_json(1, false), host_json(2, true)])),
        )
        .mount(&server)
        .await;

    let hosts = client.list_hosts().await.unwrap();
    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0].hostname, "esx21");
    assert!(hosts[1].reimage);
    assert_eq!(hosts[1].group_id, Some(3));
}

#[tokio::test]
async fn test_create_host_posts_form() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .and(body_json(json!({
            "ip": "10.0.0.21",
            "mac": "aa:bb:cc:dd:ee:21",
            "hostname": "esx21",
            "domain": "lab.local",
            "pool_id": 1,
            "group_id": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(host_json(21, false)))
        .expect(1)
        .mount(&server)
        .await;

    let form = HostForm {
        ip: "10.0.0.21".into(),
        mac: "aa:bb:cc:dd:ee:21".into(),
        hostname: "esx21".into(),
        domain: "lab.local".into(),
        pool_id: Some(1),
        group_id: Some(3),
        ks: None,
    };
    let host = client.create_host(&form).await.unwrap();
    assert_eq!(host.id, 21);
}

#[tokio::test]
async fn test_start_and_cancel_reimage_patch_flag() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/addresses/5"))
        .and(body_json(json!({ "reimage": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(host_json(5, true)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/addresses/5"))
        .and(body_json(json!({ "reimage": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(host_json(5, false)))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.start_reimage(5).await.unwrap().reimage);
    assert!(!client.cancel_reimage(5).await.unwrap().reimage);
}

#[tokio::test]
async fn test_create_pool() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "name": "lab",
            "net_address": "10.0.0.0",
            "netmask": 24,
            "start_address": "10.0.0.10",
            "end_address": "10.0.0.200",
            "gateway": "10.0.0.1",
            "only_serve_reimage": true,
            "lease_time": 7000
        })))
        .mount(&server)
        .await;

    let form = PoolForm {
        name: "lab".into(),
        net_address: "10.0.0.0".into(),
        netmask: 24,
        start_address: "10.0.0.10".into(),
        end_address: "10.0.0.200".into(),
        gateway: "10.0.0.1".into(),
        only_serve_reimage: true,
        lease_time: 7000,
    };
    let pool = client.create_pool(&form).await.unwrap();
    assert_eq!(pool.id, 4);
    assert_eq!(pool.netmask, 24);
}

#[tokio::test]
async fn test_delete_group_accepts_no_content() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/groups/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_group(9).await.unwrap();
}

#[tokio::test]
async fn test_check_ilom_reachable() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkilo"))
        .and(body_json(json!({ "iloIpAddr": "10.9.0.5", "port": "443" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "IP 10.9.0.5 reached at port 443" })),
        )
        .mount(&server)
        .await;

    let resp = client.check_ilom("10.9.0.5", 443).await.unwrap();
    assert!(resp.rejection().is_none());
    assert_eq!(resp.message.as_deref(), Some("IP 10.9.0.5 reached at port 443"));
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": "invalid username or password" })),
        )
        .mount(&server)
        .await;

    let err = client
        .login("admin", &SecretString::from("wrong"))
        .await
        .unwrap_err();
    assert!(err.is_auth_expired());
    assert!(err.to_string().contains("invalid username or password"));
}

#[tokio::test]
async fn test_check_ilom_unreachable_is_503() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkilo"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({ "message": "IP 10.9.0.6 is not reachable at port 443" })),
        )
        .mount(&server)
        .await;

    let err = client.check_ilom("10.9.0.6", 443).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "IP 10.9.0.6 is not reachable at port 443");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_host_validation_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_status": 400,
            "error_message": "the ip address is not in the scope of the dhcp pool associated with the group"
        })))
        .mount(&server)
        .await;

    let err = client.create_host(&HostForm::default()).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("not in the scope"));
}

#[tokio::test]
async fn test_get_missing_host_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/addresses/77"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error_status": 404, "error_message": "not found" })),
        )
        .mount(&server)
        .await;

    assert!(client.get_host(77).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    match client.list_pools().await.unwrap_err() {
        Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
