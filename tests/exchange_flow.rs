//! End-to-end exchange tests against mock peers.

use std::time::Duration;

use exchange_hub::config::{FallbackSource, HubConfig, PeerConfig};
use serde_json::{json, Value};

mod common;

const LIVE_REPLY: &str =
    r#"{"success":true,"serviceName":"CourseBuilder","payload":"{\"courses\":[{\"title\":\"Rust 101\"}]}"}"#;

fn hub_config(course_builder_url: Option<&str>) -> HubConfig {
    let mut config = HubConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.peers.push(PeerConfig::new("SkillsEngine", None));
    config.peers.push(PeerConfig::new("CourseBuilder", course_builder_url));
    config
}

fn envelope(requester: &str, payload: Value) -> Value {
    json!({ "requesterName": requester, "payload": payload.to_string() })
}

async fn exchange(addr: std::net::SocketAddr, body: Value) -> (u16, Value) {
    let res = common::client()
        .post(format!("http://{}/exchange", addr))
        .json(&body)
        .send()
        .await
        .expect("hub unreachable");
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

fn inner_payload(body: &Value) -> Value {
    serde_json::from_str(body["payload"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_unknown_requester_is_forbidden() {
    let peer = common::start_fixed_peer(200, LIVE_REPLY).await;
    let (addr, shutdown) = common::start_hub(hub_config(Some(&peer.url()))).await;

    let (status, body) = exchange(addr, json!({"requesterName": "UnknownBot", "payload": "{}"})).await;
    assert_eq!(status, 403);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("UnknownBot"));

    let (status, _) = exchange(
        addr,
        envelope("UnknownBot", json!({"targetService": "CourseBuilder"})),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(peer.hits(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_raw_query_is_rejected() {
    let peer = common::start_fixed_peer(200, LIVE_REPLY).await;
    let (addr, shutdown) = common::start_hub(hub_config(Some(&peer.url()))).await;

    let (status, body) = exchange(
        addr,
        json!({"requesterName": "CourseBuilder", "payload": {"sql": "DROP TABLE x"}}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);

    let (status, _) = exchange(
        addr,
        envelope(
            "CourseBuilder",
            json!({"targetService": "CourseBuilder", "fields": ["employees.salary"]}),
        ),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(peer.hits(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let (addr, shutdown) = common::start_hub(hub_config(None)).await;

    let res = common::client()
        .post(format!("http://{}/exchange", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);

    let (status, _) = exchange(addr, json!({"requesterName": "CourseBuilder", "payload": "{oops"})).await;
    assert_eq!(status, 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_live_forward_carries_envelope_and_provenance() {
    let peer = common::start_fixed_peer(200, LIVE_REPLY).await;
    let (addr, shutdown) = common::start_hub(hub_config(Some(&peer.url()))).await;

    let (status, body) = exchange(
        addr,
        envelope("SkillsEngine", json!({"targetService": "CourseBuilder", "employeeId": "e1"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["serviceName"], "CourseBuilder");
    assert_eq!(body["source"], "liveResponse");
    assert_eq!(inner_payload(&body), json!({"courses": [{"title": "Rust 101"}]}));

    let sent = peer.last_body().unwrap();
    assert_eq!(sent["requesterName"], "DirectoryHub");
    let forwarded: Value = serde_json::from_str(sent["payload"].as_str().unwrap()).unwrap();
    assert_eq!(forwarded, json!({"employeeId": "e1"}));

    shutdown.trigger();
}

#[tokio::test]
async fn test_unconfigured_peer_gets_fallback() {
    let (addr, shutdown) = common::start_hub(hub_config(None)).await;

    let (status, body) = exchange(
        addr,
        envelope("CourseBuilder", json!({"targetService": "SkillsEngine", "employeeId": "e1"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "fallbackNotConfigured");
    assert_eq!(body["serviceName"], "SkillsEngine");
    assert_eq!(inner_payload(&body)["employeeId"], "e1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_opens_after_threshold() {
    let peer = common::start_fixed_peer(500, "boom").await;
    let mut config = hub_config(Some(&peer.url()));
    config.circuit_breaker.failure_threshold = 5;
    config.internal.shared_secret = Some("s3cret".into());
    let (addr, shutdown) = common::start_hub(config).await;

    let request = envelope("SkillsEngine", json!({"targetService": "CourseBuilder", "employeeId": "e1"}));
    for _ in 0..5 {
        let (status, body) = exchange(addr, request.clone()).await;
        assert_eq!(status, 200);
        assert_eq!(body["source"], "fallbackCallError");
    }
    assert_eq!(peer.hits(), 5);

    let (status, body) = exchange(addr, request).await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "fallbackCircuitOpen");
    assert_eq!(inner_payload(&body)["employeeId"], "e1");
    assert_eq!(peer.hits(), 5, "open breaker must not touch the network");

    let breakers: Value = common::client()
        .get(format!("http://{}/internal/breakers", addr))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = breakers
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["peer"] == "coursebuilder")
        .expect("breaker listed");
    assert_eq!(entry["state"], "open");
    assert_eq!(entry["consecutiveFailures"], 5);

    shutdown.trigger();
}

#[tokio::test]
async fn test_peer_rejection_is_passed_through() {
    let peer = common::start_fixed_peer(422, r#"{"error":"bad employeeId"}"#).await;
    let (addr, shutdown) = common::start_hub(hub_config(Some(&peer.url()))).await;

    let (status, body) = exchange(
        addr,
        envelope("SkillsEngine", json!({"targetService": "CourseBuilder", "employeeId": 7})),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().contains("bad employeeId"));
    assert_eq!(peer.hits(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_peer_times_out_into_fallback() {
    let peer = common::start_programmable_peer(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, LIVE_REPLY.to_string())
    })
    .await;
    let mut config = hub_config(Some(&peer.url()));
    config.timeouts.request_secs = 1;
    let (addr, shutdown) = common::start_hub(config).await;

    let (status, body) = exchange(
        addr,
        envelope("SkillsEngine", json!({"targetService": "CourseBuilder"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "fallbackCallError");

    shutdown.trigger();
}

#[tokio::test]
async fn test_fallback_snapshot_from_file() {
    let path = std::env::temp_dir().join(format!("hub-fallback-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"{"version":"v1","services":{"CourseBuilder":{"courses":[],"stale":true}}}"#,
    )
    .unwrap();

    let peer = common::start_fixed_peer(503, "down").await;
    let mut config = hub_config(Some(&peer.url()));
    config.fallback.sources = vec![
        FallbackSource::File { path: "/nonexistent/fallback.json".into() },
        FallbackSource::File { path: path.clone() },
    ];
    let (addr, shutdown) = common::start_hub(config).await;

    let (status, body) = exchange(
        addr,
        envelope("SkillsEngine", json!({"targetService": "CourseBuilder", "employeeId": "e9"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "fallbackCallError");
    assert_eq!(
        inner_payload(&body),
        json!({"courses": [], "stale": true, "employeeId": "e9"})
    );

    shutdown.trigger();
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_unknown_target_is_unavailable() {
    let (addr, shutdown) = common::start_hub(hub_config(None)).await;

    let (status, body) = exchange(addr, envelope("CourseBuilder", json!({"targetService": "Payroll"}))).await;
    assert_eq!(status, 503);
    assert_eq!(body["success"], false);

    shutdown.trigger();
}

#[tokio::test]
async fn test_internal_endpoints_fail_closed() {
    let (addr, shutdown) = common::start_hub(hub_config(None)).await;

    let res = common::client()
        .get(format!("http://{}/internal/status", addr))
        .bearer_auth("anything")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);

    shutdown.trigger();
}

#[tokio::test]
async fn test_pushed_record_is_served_locally() {
    let mut config = hub_config(None);
    config.internal.shared_secret = Some("s3cret".into());
    let (addr, shutdown) = common::start_hub(config).await;
    let client = common::client();
    let push_url = format!("http://{}/internal/resources/employees", addr);
    let record = json!({"id": "e1", "firstName": "Ada", "email": "ada@x.io", "salary": 100});

    let res = client.post(&push_url).bearer_auth("wrong").json(&record).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client.post(&push_url).json(&record).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .post(format!("http://{}/internal/resources/payroll", addr))
        .bearer_auth("s3cret")
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client.post(&push_url).bearer_auth("s3cret").json(&record).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let ack: Value = res.json().await.unwrap();
    assert_eq!(ack["id"], "e1");
    assert_eq!(ack["count"], 1);

    let (status, body) = exchange(
        addr,
        envelope("SkillsEngine", json!({"resource": "employees", "employeeId": "e1"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["serviceName"], "DirectoryHub");
    assert!(body.get("source").is_none());
    assert_eq!(
        inner_payload(&body),
        json!({
            "employees": [{"id": "e1", "firstName": "Ada", "email": "ada@x.io"}],
            "employeeId": "e1"
        })
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_rejects_excess() {
    let mut config = hub_config(None);
    config.rate_limit.max_requests = 2;
    let (addr, shutdown) = common::start_hub(config).await;

    let request = envelope("CourseBuilder", json!({}));
    assert_eq!(exchange(addr, request.clone()).await.0, 200);
    assert_eq!(exchange(addr, request.clone()).await.0, 200);

    let res = common::client()
        .post(format!("http://{}/exchange", addr))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.text().await.unwrap(), "Rate limit exceeded");

    // Only /exchange is limited.
    let res = common::client().get(format!("http://{}/health", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_sets_standard_headers() {
    let (addr, shutdown) = common::start_hub(hub_config(None)).await;

    let res = common::client().get(format!("http://{}/health", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "service": "DirectoryHub"}));

    shutdown.trigger();
}
