#![allow(clippy::unwrap_used)]
// End-to-end tests: a live `Reconciler` against wiremock feed and panel servers.

use std::time::Duration;

use secrecy::SecretString;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use panelsync_api::TransitionTime;
use panelsync_core::{
    CoreError, DeviceConfig, EntitySpec, FeedConfig, Palette, PanelState, Reconciler,
    ServiceConfig,
};

const PINK: &str = "255 51 153";
const BLUE: &str = "51 51 255";

// ── Helpers ─────────────────────────────────────────────────────────

fn service_config(server: &MockServer, entities: &[(&str, u32)]) -> ServiceConfig {
    ServiceConfig {
        feed: FeedConfig {
            url: Url::parse(&format!("{}/counters", server.uri())).unwrap(),
            connect_timeout: Duration::from_secs(2),
            idle_timeout: Some(Duration::from_secs(5)),
        },
        device: DeviceConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            auth_token: SecretString::from("tok".to_string()),
            request_timeout: Duration::from_secs(2),
            transition: TransitionTime::default(),
        },
        palette: Palette::default(),
        backoff: Duration::from_millis(10),
        entities: entities
            .iter()
            .map(|(id, panel_id)| EntitySpec {
                id: (*id).into(),
                panel_id: *panel_id,
                default_state: PanelState::Idle,
            })
            .collect(),
    }
}

/// Event-stream body with one `counters` record per snapshot.
fn feed_body(snapshots: &[&[(&str, u64)]]) -> String {
    snapshots
        .iter()
        .map(|counts| {
            let app: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(id, n)| ((*id).to_owned(), serde_json::json!({ "count": n })))
                .collect();
            format!(
                "event: counters\ndata: {}\n\n",
                serde_json::json!({ "app": app })
            )
        })
        .collect()
}

/// `animData` of every effect write received so far, in order.
async fn effect_writes(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["write"]["animData"].as_str().unwrap().to_owned()
        })
        .collect()
}

async fn feed_opens(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count()
}

async fn wait_for_writes(server: &MockServer, n: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let writes = effect_writes(server).await;
        if writes.len() >= n {
            return writes;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {n} effect writes, saw {writes:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn anim(panel_id: u32, color: &str) -> String {
    format!("1 {panel_id} 1 {color} 0 0")
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_feed_changes_drive_panel_writes_across_reconnects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/counters"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed_body(&[
            &[("svc-a", 0)],
            &[("svc-a", 3)],
            &[("svc-a", 3)],
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok/effects"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let mut reconciler =
        Reconciler::from_config(service_config(&server, &[("svc-a", 51890)]), cancel.clone())
            .unwrap();
    let task = tokio::spawn(async move { reconciler.run().await });

    let writes = wait_for_writes(&server, 4).await;
    cancel.cancel();
    task.await.unwrap();

    // Session 1: 0 -> 3 -> 3. Session 2 starts from the kept baseline of 3,
    // so the replayed 0 is a decrease and lights the panel again.
    assert_eq!(
        writes[..4],
        [
            anim(51890, PINK),
            anim(51890, BLUE),
            anim(51890, PINK),
            anim(51890, BLUE),
        ]
    );
    assert!(feed_opens(&server).await >= 2);
}

#[tokio::test]
async fn test_rejected_panel_does_not_block_the_next_one() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/counters"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed_body(&[&[
            ("a", 1),
            ("b", 1),
            ("c", 1),
        ]])))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok/effects"))
        .and(body_string_contains("\"1 2 1 "))
        .respond_with(ResponseTemplate::new(500).set_body_string("panel offline"))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok/effects"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let mut reconciler = Reconciler::from_config(
        service_config(&server, &[("a", 1), ("b", 2), ("c", 3)]),
        cancel.clone(),
    )
    .unwrap();
    let task = tokio::spawn(async move { reconciler.run().await });

    let writes = wait_for_writes(&server, 3).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(
        writes[..3],
        [anim(1, PINK), anim(2, PINK), anim(3, PINK)]
    );
}

#[tokio::test]
async fn test_from_config_requires_entities() {
    let server = MockServer::start().await;

    let result = Reconciler::from_config(service_config(&server, &[]), CancellationToken::new());

    assert!(
        matches!(result, Err(CoreError::ConfigMissing { ref field }) if field == "entities"),
        "expected ConfigMissing for entities"
    );
}
