// Console workflows against a mocked provisioning server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use via_api::ProgressEvent;
use via_core::import::{self, CsvSchema, HostTarget, ImportTarget};
use via_core::{
    AuthCredentials, Command, ConnectionState, Console, ConsoleConfig, CoreError, GroupId,
    HostId, PoolId, ValidationKind, Vendor, WizardCandidate, WizardSession, WizardState,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Fixtures ────────────────────────────────────────────────────────

fn host_json(id: i64, reimage: bool, progress: i64, text: &str) -> Value {
    json!({
        "id": id,
        "ip": format!("10.0.0.{id}"),
        "mac": format!("aa:bb:cc:dd:ee:{id:02x}"),
        "hostname": format!("esx{id:02}"),
        "domain": "lab.local",
        "reimage": reimage,
        "pool_id": 1,
        "group_id": 3,
        "progress": progress,
        "progresstext": text,
        "ks": ""
    })
}

fn group_json() -> Value {
    json!({
        "id": 3,
        "name": "edge",
        "pool_id": 1,
        "image_id": 2,
        "dns": "10.0.0.1",
        "ntp": "pool.ntp.org",
        "options": { "ssh": true }
    })
}

async fn mount_inventory(server: &MockServer, hosts: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/addresses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hosts))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([group_json()])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/pools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ConsoleConfig {
    ConsoleConfig::new(
        Url::parse(&server.uri()).unwrap(),
        AuthCredentials::Anonymous,
    )
}

async fn connected(server: &MockServer) -> Console {
    let mut config = config(server);
    config.progress_enabled = false;
    let console = Console::new(config);
    console.connect().await.unwrap();
    console
}

/// Echo a created host back with an id taken from its address.
fn echo_created_host(req: &Request) -> ResponseTemplate {
    let body: Value = req.body_json().unwrap();
    let ip = body["ip"].as_str().unwrap_or_default().to_owned();
    let id: i64 = ip.rsplit('.').next().unwrap().parse().unwrap();
    let mut record = body.clone();
    record["id"] = json!(id);
    record["reimage"] = json!(false);
    ResponseTemplate::new(200).set_body_json(record)
}

/// Echo a created pool back under id 7.
fn echo_created_pool(req: &Request) -> ResponseTemplate {
    let mut record: Value = req.body_json().unwrap();
    record["id"] = json!(7);
    ResponseTemplate::new(200).set_body_json(record)
}

fn log_frame(id: i64, percentage: u8, text: &str) -> Message {
    Message::text(
        json!({
            "level": "info",
            "msg": "progress",
            "id": id,
            "percentage": percentage,
            "progresstext": text
        })
        .to_string(),
    )
}

fn event(id: i64, percentage: u8, text: &str) -> ProgressEvent {
    ProgressEvent {
        host_id: id,
        percentage,
        progresstext: text.into(),
    }
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_fills_store_and_seeds_progress() {
    let server = MockServer::start().await;
    mount_inventory(
        &server,
        json!([host_json(1, true, 40, "kickstart"), host_json(2, false, 0, "")]),
    )
    .await;

    let console = connected(&server).await;

    assert_eq!(console.store().host_count(), 2);
    let group = console.store().group(GroupId(3)).unwrap();
    assert_eq!(group.host_count(), 2);
    assert!(group.options.ssh);

    let progress = console.progress();
    assert_eq!(progress.percentage(HostId(1)), Some(40));
    assert_eq!(progress.status_text(HostId(1)).as_deref(), Some("kickstart"));
    assert_eq!(progress.get(HostId(2)), None);
    assert_eq!(console.reimaging_hosts().len(), 1);

    assert_eq!(*console.connection_state().borrow(), ConnectionState::Connected);
    assert!(console.store().last_full_refresh().is_some());

    console.disconnect().await;
    assert_eq!(*console.connection_state().borrow(), ConnectionState::Disconnected);
}

// ── Progress stream ─────────────────────────────────────────────────

#[tokio::test]
async fn progress_stream_drives_store_until_completion() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, true, 10, "mboot.efi")])).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(r#"{"level":"info","msg":"dhcp ack","id":1}"#))
            .await
            .unwrap();
        ws.send(log_frame(1, 40, "kickstart")).await.unwrap();
        let _ = release_rx.await;
        ws.send(log_frame(1, 100, "completed")).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut config = config(&server);
    config.progress_url = Some(Url::parse(&format!("ws://{addr}/v1/log")).unwrap());
    let console = Console::new(config);
    console.connect().await.unwrap();
    assert_eq!(console.progress().status_text(HostId(1)).as_deref(), Some("mboot.efi"));

    let mut records = console.progress_records();
    tokio::time::timeout(
        WAIT,
        records.wait_for(|r| {
            r.iter()
                .any(|p| p.host_id == HostId(1) && p.status_text == "kickstart")
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(console.progress().percentage(HostId(1)), Some(40));
    assert!(console.store().host(HostId(1)).unwrap().reimage);

    release_tx.send(()).unwrap();

    let mut hosts = console.hosts();
    tokio::time::timeout(
        WAIT,
        hosts.wait_for(|h| h.iter().any(|h| h.id == HostId(1) && !h.reimage)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(console.progress().percentage(HostId(1)), Some(100));
    assert!(console.reimaging_hosts().is_empty());

    console.disconnect().await;
}

// ── Import ──────────────────────────────────────────────────────────

#[tokio::test]
async fn import_records_each_row_independently() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .and(body_partial_json(json!({ "hostname": "esx12" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_status": 400,
            "error_message": "the ip address is not in the scope of the dhcp pool associated with the group"
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .respond_with(echo_created_host)
        .mount(&server)
        .await;

    let console = connected(&server).await;

    let csv = "fqdn,ip,mac\n\
               esx11.lab.local,10.0.0.11,AA:BB:CC:00:00:11\n\
               esx12.lab.local,10.0.0.12,AA:BB:CC:00:00:12\n\
               esx13.lab.local,10.0.0.13\n\
               esx14.lab.local,10.0.0.14,AA:BB:CC:00:00:14\n";
    let parsed = import::parse(csv, &CsvSchema::HOSTS).unwrap();
    assert_eq!(parsed.rows.len(), 3);
    assert_eq!(parsed.skipped.len(), 1);

    let target = ImportTarget::Hosts(HostTarget {
        group_id: Some(GroupId(3)),
        pool_id: Some(PoolId(1)),
    });
    let report = import::submit(&console, &parsed, target).await;

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].line, 3);
    assert_eq!(report.failures[0].subject, "esx12.lab.local");
    assert!(report.failures[0].message.contains("not in the scope"));

    let store = console.store();
    assert_eq!(store.host_count(), 2);
    let host = store.host_by_fqdn("esx14.lab.local").unwrap();
    assert_eq!(host.mac.as_str(), "aa:bb:cc:00:00:14");
    assert_eq!(store.group(GroupId(3)).unwrap().host_count(), 2);
}

#[tokio::test]
async fn pool_import_applies_reimage_only_defaults() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([])).await;

    let defaults = json!({ "only_serve_reimage": true, "lease_time": 7000 });
    Mock::given(method("POST"))
        .and(path("/v1/pools"))
        .and(body_partial_json(defaults.clone()))
        .and(body_partial_json(json!({ "name": "lab-b" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_status": 400,
            "error_message": "the pool overlaps an existing pool"
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/pools"))
        .and(body_partial_json(defaults))
        .respond_with(echo_created_pool)
        .expect(1)
        .mount(&server)
        .await;

    let console = connected(&server).await;

    let csv = "name,net_address,netmask,start_address,end_address,gateway
               lab-a,10.0.0.0,24,10.0.0.100,10.0.0.200,10.0.0.1
               lab-b,10.0.1.0,24,10.0.1.100,10.0.1.200,10.0.1.1
";
    let parsed = import::parse(csv, &CsvSchema::POOLS).unwrap();
    let report = import::submit(&console, &parsed, ImportTarget::Pools).await;

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].line, 3);
    assert_eq!(report.failures[0].subject, "lab-b");
    assert!(report.failures[0].message.contains("overlaps"));

    let pools = console.pools_snapshot();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].name, "lab-a");
    assert!(pools[0].only_serve_reimage);
    assert_eq!(pools[0].lease_time, 7000);
}

// ── Reimage ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reimage_progress_and_completion_round_trip() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, false, 0, "")])).await;
    Mock::given(method("PATCH"))
        .and(path("/v1/addresses/1"))
        .and(body_json(json!({ "reimage": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(host_json(1, true, 0, "")))
        .expect(1)
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let host = console.reimage_host(HostId(1)).await.unwrap();
    assert!(host.reimage);
    assert_eq!(console.progress().percentage(HostId(1)), Some(0));
    assert_eq!(console.progress().status_text(HostId(1)).as_deref(), Some("reimaging"));

    console
        .apply_progress_event(&event(1, 55, "kickstart"))
        .await
        .unwrap();
    assert_eq!(console.progress().percentage(HostId(1)), Some(55));

    // The server still reports the flag when the completion event lands.
    server.reset().await;
    mount_inventory(&server, json!([host_json(1, true, 100, "completed")])).await;

    console
        .apply_progress_event(&event(1, 100, "completed"))
        .await
        .unwrap();

    assert!(!console.store().host(HostId(1)).unwrap().reimage);
    assert!(console.reimaging_hosts().is_empty());
    assert_eq!(console.progress().percentage(HostId(1)), Some(100));
}

#[tokio::test]
async fn completion_refetch_does_not_drop_hosts_created_meanwhile() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, true, 90, "kickstart")])).await;
    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .respond_with(echo_created_host)
        .mount(&server)
        .await;

    let console = connected(&server).await;

    // A slow refetch that predates the host created below.
    Mock::given(method("GET"))
        .and(path("/v1/addresses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([host_json(1, false, 100, "completed")]))
                .set_delay(Duration::from_millis(300)),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    let reconciling = {
        let console = console.clone();
        tokio::spawn(async move {
            console
                .apply_progress_event(&event(1, 100, "completed"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let parsed = import::parse(
        "fqdn,ip,mac\nesx11.lab.local,10.0.0.11,aa:bb:cc:00:00:11\n",
        &CsvSchema::HOSTS,
    )
    .unwrap();
    let target = ImportTarget::Hosts(HostTarget {
        group_id: Some(GroupId(3)),
        pool_id: Some(PoolId(1)),
    });
    let report = import::submit(&console, &parsed, target).await;
    reconciling.await.unwrap().unwrap();

    assert_eq!(report.created.len(), 1);
    let store = console.store();
    assert!(store.host(HostId(11)).is_some());
    assert!(!store.host(HostId(1)).unwrap().reimage);
    assert_eq!(store.group(GroupId(3)).unwrap().host_count(), 2);
}

#[tokio::test]
async fn cancel_reimage_keeps_host_and_marks_progress() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, true, 30, "mboot.efi")])).await;
    Mock::given(method("PATCH"))
        .and(path("/v1/addresses/1"))
        .and(body_json(json!({ "reimage": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(host_json(1, false, 0, "")))
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let host = console.cancel_reimage(HostId(1)).await.unwrap();

    assert!(!host.reimage);
    assert!(console.store().host(HostId(1)).is_some());
    assert_eq!(console.progress().percentage(HostId(1)), Some(0));
    assert_eq!(
        console.progress().status_text(HostId(1)).as_deref(),
        Some("reimaging canceled")
    );
}

#[tokio::test]
async fn failed_reimage_leaves_state_untouched() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, false, 0, "")])).await;
    Mock::given(method("PATCH"))
        .and(path("/v1/addresses/1"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "database is locked" })),
        )
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let err = console.reimage_host(HostId(1)).await.unwrap_err();

    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert!(!console.store().host(HostId(1)).unwrap().reimage);
    assert!(console.progress().get(HostId(1)).is_none());
}

// ── Hosts and groups ────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_host_drops_it_and_its_progress() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, true, 40, "kickstart")])).await;
    Mock::given(method("DELETE"))
        .and(path("/v1/addresses/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let console = connected(&server).await;
    assert!(console.progress().get(HostId(1)).is_some());

    console.execute(Command::DeleteHost(HostId(1))).await.unwrap();

    assert!(console.store().host(HostId(1)).is_none());
    assert!(console.progress().get(HostId(1)).is_none());
    assert_eq!(console.store().group(GroupId(3)).unwrap().host_count(), 0);
}

#[tokio::test]
async fn deleting_a_populated_group_is_refused_locally() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([host_json(1, false, 0, "")])).await;
    Mock::given(method("DELETE"))
        .and(path("/v1/groups/3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let err = console
        .execute(Command::DeleteGroup(GroupId(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidState { .. }));
    assert!(console.store().group(GroupId(3)).is_some());
}

// ── Wizard ──────────────────────────────────────────────────────────

#[tokio::test]
async fn wizard_reports_unreachable_controllers() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/v1/checkilo"))
        .and(body_json(json!({ "iloIpAddr": "10.9.0.1", "port": "443" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "IP 10.9.0.1 reached at port 443" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/checkilo"))
        .and(body_json(json!({ "iloIpAddr": "10.9.0.2", "port": "443" })))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({ "message": "IP 10.9.0.2 is not reachable at port 443" })),
        )
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let mut wizard = WizardSession::from_config(console.config());
    wizard.set_vendor(Vendor::Hpe).unwrap();
    for ip in ["10.9.0.1", "10.9.0.2"] {
        wizard
            .add_candidate(WizardCandidate::new(ip, "Administrator", "pw".into()))
            .unwrap();
    }

    assert_eq!(wizard.validate(&console).await.unwrap(), WizardState::Error);
    assert_eq!(wizard.errors().len(), 1);
    assert_eq!(wizard.errors()[0].subject, "10.9.0.2");
    assert_eq!(wizard.errors()[0].kind, ValidationKind::Unreachable);
    assert!(wizard.commit(&console, HostTarget::default()).await.is_err());
    assert_ne!(wizard.state(), WizardState::Committed);
}

#[tokio::test]
async fn wizard_commits_validated_candidates() {
    let server = MockServer::start().await;
    mount_inventory(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/v1/checkilo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/addresses"))
        .respond_with(echo_created_host)
        .mount(&server)
        .await;

    let console = connected(&server).await;
    let mut wizard = WizardSession::from_config(console.config());
    wizard.set_vendor(Vendor::Dell).unwrap();
    wizard
        .add_candidate(
            WizardCandidate::new("10.9.0.21", "root", "calvin".into()).with_host(
                "esx21.lab.local",
                "10.0.0.21",
                "aa:bb:cc:00:00:21",
            ),
        )
        .unwrap();
    wizard
        .add_candidate(WizardCandidate::new("10.9.0.22", "root", "calvin".into()))
        .unwrap();

    assert_eq!(wizard.validate(&console).await.unwrap(), WizardState::Ready);

    let target = HostTarget {
        group_id: Some(GroupId(3)),
        pool_id: Some(PoolId(1)),
    };
    let report = wizard.commit(&console, target).await.unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, "10.9.0.22");
    assert_eq!(wizard.state(), WizardState::Committed);
    assert!(wizard.candidates().is_empty());
    assert!(console.store().host(HostId(21)).is_some());
}
