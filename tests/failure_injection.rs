//! Failure injection tests for the workload service.

use std::collections::HashSet;
use std::sync::Arc;

use apm_workload::config::AppConfig;
use apm_workload::faults::{sites, FaultEffect, FaultRule, ResourceKind};
use apm_workload::observability::{FieldValue, LogRecord, LogSink, Severity, SinkError};
use axum::http::StatusCode;
use sdk_rust::WorkloadClient;
use serde_json::{json, Value};

mod common;

struct FailingSink;

impl LogSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn write(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("disk full".into()))
    }
}

fn force(site: &str, effect: FaultEffect) -> impl FnOnce(&mut AppConfig) + '_ {
    move |config: &mut AppConfig| {
        config.faults.default_error_rate = 100.0;
        config.faults.sites.insert(site.to_string(), vec![FaultRule::new(1.0, effect)]);
    }
}

async fn get(app: &common::TestApp, path: &str) -> (StatusCode, String, Value) {
    let res = common::client()
        .get(format!("{}{}", app.url, path))
        .send()
        .await
        .expect("service unreachable");
    let status = StatusCode::from_u16(res.status().as_u16()).unwrap();
    let header = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body: Value = res.json().await.expect("body is not JSON");
    (status, header, body)
}

#[tokio::test]
async fn test_correlation_id_is_shared_by_response_and_logs() {
    let app = common::spawn_app(|_| {}).await;

    let (status, header, body) = get(&app, "/api/fast").await;
    assert_eq!(status, StatusCode::OK);
    let id = body["request_id"].as_str().unwrap();
    assert_eq!(id, header);
    assert!(body["timestamp"].is_string());

    app.completion_for(id).await;
    let records = app.logs_for(id);
    let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages.first(), Some(&"request started"));
    assert!(messages.contains(&"fast request processed"));
    assert_eq!(messages.last(), Some(&"request completed"));
    for record in &records {
        assert_eq!(record.correlation_id, id);
        assert_eq!(record.field("path"), Some(&FieldValue::from("/api/fast")));
        assert_eq!(record.field("method"), Some(&FieldValue::from("GET")));
        assert_eq!(record.logger, "apm_workload_test");
    }
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_ids() {
    let app = common::spawn_app(|_| {}).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let url = format!("{}/api/fast", app.url);
        handles.push(tokio::spawn(async move {
            let res = common::client().get(url).send().await.unwrap();
            let body: Value = res.json().await.unwrap();
            body["request_id"].as_str().unwrap().to_string()
        }));
    }

    let mut ids = HashSet::new();
    for h in handles {
        ids.insert(h.await.unwrap());
    }
    assert_eq!(ids.len(), 20);
    for id in &ids {
        app.completion_for(id).await;
        assert!(app.logs_for(id).iter().all(|r| &r.correlation_id == id));
    }
}

#[tokio::test]
async fn test_client_request_id_is_recorded_not_adopted() {
    let app = common::spawn_app(|_| {}).await;

    let res = common::client()
        .get(format!("{}/api/fast", app.url))
        .header("x-request-id", "caller-supplied")
        .send()
        .await
        .unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_ne!(id, "caller-supplied");

    let started = app
        .logs_for(&id)
        .into_iter()
        .find(|r| r.message == "request started")
        .unwrap();
    assert_eq!(
        started.field("client_request_id"),
        Some(&FieldValue::from("caller-supplied"))
    );
}

#[tokio::test]
async fn test_crash_test_is_always_a_structured_500() {
    let app = common::spawn_app(|_| {}).await;

    for _ in 0..15 {
        let (status, header, body) = get(&app, "/api/crash-test").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["error_type"], "InternalFault");
        assert_eq!(body["request_id"], header.as_str());

        app.completion_for(&header).await;
        let records = app.logs_for(&header);
        assert!(records.iter().any(|r| r.severity == Severity::Critical));
        let completed = records.iter().find(|r| r.message == "request completed").unwrap();
        assert_eq!(completed.field("status"), Some(&FieldValue::from(500u16)));
    }
}

#[tokio::test]
async fn test_failing_sink_never_fails_a_request() {
    let app =
        common::spawn_app_with_sinks(|_| {}, vec![Arc::new(FailingSink) as Arc<dyn LogSink>])
            .await;

    let (status, _, body) = get(&app, "/api/fast").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Fast response");

    let (status, _, stats) = get(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert!(stats["log_sink_failures"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_error_rate_control_api() {
    assert_eq!(AppConfig::default().faults.default_error_rate, 3.0);
    let app = common::spawn_app(|c| {
        c.faults.default_error_rate = AppConfig::default().faults.default_error_rate
    })
    .await;
    let sdk = WorkloadClient::new(&app.url);

    assert_eq!(sdk.get_error_rate().await.unwrap().current_error_rate, 3.0);

    let update = sdk.set_error_rate(50.0).await.unwrap();
    assert_eq!(update.old_error_rate, 3.0);
    assert_eq!(update.new_error_rate, 50.0);
    assert_eq!(sdk.get_error_rate().await.unwrap().current_error_rate, 50.0);

    assert!(sdk.set_error_rate(150.0).await.is_err());
    assert!(sdk.set_error_rate(-1.0).await.is_err());
    assert_eq!(sdk.get_error_rate().await.unwrap().current_error_rate, 50.0);

    for body in ["not json", "{\"error_rate\": \"high\"}", "{}"] {
        let res = common::client()
            .post(format!("{}/api/set-error-rate", app.url))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error_type"], "ClientInputError");
        assert!(body["request_id"].is_string());
    }
    assert_eq!(app.state.policy.error_rate(), 50.0);

    let audit = app
        .sink
        .records()
        .into_iter()
        .find(|r| r.message == "error rate changed")
        .unwrap();
    assert_eq!(audit.field("old_error_rate"), Some(&FieldValue::from(3.0)));
    assert_eq!(audit.field("new_error_rate"), Some(&FieldValue::from(50.0)));
}

#[tokio::test]
async fn test_admin_key_protects_updates() {
    let app = common::spawn_app(|c| c.admin.api_key = Some("s3cret".into())).await;

    let anonymous = WorkloadClient::new(&app.url);
    let err = anonymous.set_error_rate(10.0).await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert_eq!(anonymous.get_error_rate().await.unwrap().current_error_rate, 0.0);

    let wrong = WorkloadClient::new(&app.url).with_api_key("nope");
    assert!(wrong.set_error_rate(10.0).await.is_err());

    let admin = WorkloadClient::new(&app.url).with_api_key("s3cret");
    assert_eq!(admin.set_error_rate(10.0).await.unwrap().new_error_rate, 10.0);
}

#[tokio::test]
async fn test_security_error_is_401_or_403() {
    let app = common::spawn_app(|_| {}).await;
    for _ in 0..10 {
        let (status, _, body) = get(&app, "/api/security-error").await;
        assert!(
            status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN,
            "unexpected status {}",
            status
        );
        assert!(body["code"].as_str().unwrap().starts_with("SECURITY_"));
    }
}

#[tokio::test]
async fn test_unmatched_routes_and_methods() {
    let app = common::spawn_app(|_| {}).await;

    let (status, header, body) = get(&app, "/api/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["request_id"], header.as_str());

    let res = common::client()
        .delete(format!("{}/api/fast", app.url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 405);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_health_reports_ok_and_unhealthy() {
    let app = common::spawn_app(|_| {}).await;
    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let app = common::spawn_app(force(sites::HEALTH, FaultEffect::Unavailable)).await;
    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_forced_conditions_map_to_their_status() {
    let cases = [
        (sites::FAST, FaultEffect::Validation { kinds: vec![] }, "/api/fast", 400),
        (
            sites::MEMORY_INTENSIVE,
            FaultEffect::Resource { kinds: vec![ResourceKind::MemoryExhausted] },
            "/api/memory-intensive",
            507,
        ),
        (
            sites::MEMORY_INTENSIVE,
            FaultEffect::Resource { kinds: vec![ResourceKind::MemoryPressure] },
            "/api/memory-intensive",
            500,
        ),
        (sites::CPU_INTENSIVE, FaultEffect::Timeout { after_ms: 10 }, "/api/cpu-intensive", 504),
        (sites::DATABASE, FaultEffect::Crash { kinds: vec![] }, "/api/database-simulation", 500),
        (sites::CHAIN_CALLS, FaultEffect::Crash { kinds: vec![] }, "/api/chain-calls", 500),
    ];

    for (site, effect, path, expected) in cases {
        let app = common::spawn_app(force(site, effect)).await;
        let (status, header, body) = get(&app, path).await;
        assert_eq!(status.as_u16(), expected, "{} -> {}", path, body);
        assert_eq!(body["request_id"], header.as_str());

        app.completion_for(&header).await;
        let records = app.logs_for(&header);
        assert!(records
            .iter()
            .any(|r| r.message == "fault injected" || r.message == "simulated timeout"));
        assert!(records
            .iter()
            .any(|r| r.severity >= Severity::Error && r.message != "request completed"));
    }
}

#[tokio::test]
async fn test_latency_spike_slows_but_succeeds() {
    let app = common::spawn_app(force(
        sites::SLOW,
        FaultEffect::LatencySpike { min_ms: 50, max_ms: 50 },
    ))
    .await;
    let (status, _, body) = get(&app, "/api/slow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latency_spike"], true);
    assert!(body["actual_delay"].as_f64().unwrap() >= 0.06);
}

#[tokio::test]
async fn test_workloads_succeed_without_faults() {
    let app = common::spawn_app(|_| {}).await;

    let (status, _, body) = get(&app, "/api/memory-intensive").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed_items"], 500);

    let (status, _, body) = get(&app, "/api/cpu-intensive").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 333_283_335_000u64);

    let (status, _, body) = get(&app, "/api/database-simulation").await;
    assert_eq!(status, StatusCode::OK);
    let operation = body["operation"].as_str().unwrap();
    assert!(["SELECT", "INSERT", "UPDATE", "DELETE"].contains(&operation));
    let rows = body["rows_affected"].as_u64().unwrap();
    assert!((1..=100).contains(&rows));

    let (status, _, body) = get(&app, "/api/chain-calls").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services_called"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unavailable_chain_step_is_degraded() {
    let app = common::spawn_app(force(sites::CHAIN_CALLS, FaultEffect::Unavailable)).await;
    let (status, _, body) = get(&app, "/api/chain-calls").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded_services"], 4);
    assert_eq!(body["services_called"][0]["status"], "degraded");
}

#[tokio::test]
async fn test_error_random_stays_in_its_status_set() {
    let app = common::spawn_app(|_| {}).await;
    let allowed = [200u16, 400, 404, 500, 504];
    let mut seen = HashSet::new();
    for _ in 0..40 {
        let (status, _, body) = get(&app, "/api/error-random").await;
        assert!(allowed.contains(&status.as_u16()), "unexpected {}", status);
        assert!(body["request_id"].is_string());
        seen.insert(status.as_u16());
    }
    assert!(seen.len() > 1);
}

#[tokio::test]
async fn test_security_input_is_inspected_not_executed() {
    let app = common::spawn_app(|_| {}).await;
    let res = common::client()
        .post(format!("{}/api/security-input", app.url))
        .json(&json!({ "comment": "<script>alert(1)</script>", "file": "../../etc/passwd" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["executed"], false);
    assert_eq!(body["valid_json"], true);
    assert_eq!(body["top_level_keys"], json!(["comment", "file"]));
    let patterns = body["detected_patterns"].as_array().unwrap();
    assert!(patterns.contains(&json!("xss")));
    assert!(patterns.contains(&json!("path_traversal")));
    assert!(!body["sanitized_preview"].as_str().unwrap().contains('<'));
}

#[tokio::test]
async fn test_external_call_outcomes() {
    let ok = common::start_mock_backend("{\"slideshow\": {\"title\": \"Sample\"}}").await;
    let app = common::spawn_app(|c| c.external.url = format!("http://{}/json", ok)).await;
    let (status, _, body) = get(&app, "/api/external-call").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["external_data"]["slideshow"]["title"], "Sample");

    let failing = common::start_programmable_backend(|| async { (500, "oops".to_string()) }).await;
    let app = common::spawn_app(|c| c.external.url = format!("http://{}/json", failing)).await;
    let (status, _, body) = get(&app, "/api/external-call").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_BAD_STATUS");

    let garbage = common::start_mock_backend("not json").await;
    let app = common::spawn_app(|c| c.external.url = format!("http://{}/json", garbage)).await;
    let (status, _, _) = get(&app, "/api/external-call").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let closed = common::closed_port().await;
    let app = common::spawn_app(|c| c.external.url = format!("http://{}/json", closed)).await;
    let (status, _, _) = get(&app, "/api/external-call").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let silent = common::start_silent_backend().await;
    let app = common::spawn_app(|c| {
        c.external.url = format!("http://{}/json", silent);
        c.timeouts.external_call_secs = 1;
    })
    .await;
    let (status, _, body) = get(&app, "/api/external-call").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "UPSTREAM_TIMEOUT");
}

#[tokio::test]
async fn test_request_deadline_answers_504() {
    let app = common::spawn_app(|c| {
        c.timeouts.request_secs = 1;
        c.workloads.slow_min_ms = 1_500;
        c.workloads.slow_max_ms = 1_500;
    })
    .await;

    let (status, header, body) = get(&app, "/api/slow").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "DEADLINE_EXCEEDED");

    let completion = app.completion_for(&header).await;
    assert_eq!(completion.message, "request completed");
    assert_eq!(completion.field("outcome"), Some(&FieldValue::from("timed_out")));
    assert_eq!(completion.severity, Severity::Error);
}

#[tokio::test]
async fn test_stats_counts_requests() {
    let app = common::spawn_app(|_| {}).await;
    get(&app, "/api/fast").await;
    get(&app, "/api/fast").await;
    get(&app, "/api/slow").await;

    let stats = WorkloadClient::new(&app.url).stats().await.unwrap();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.endpoints.get("fast"), Some(&2));
    assert_eq!(stats.endpoints.get("slow"), Some(&1));
    assert_eq!(stats.current_error_rate, 0.0);
    assert!(stats.available_endpoints.iter().any(|e| e == "/api/crash-test"));
}

#[tokio::test]
async fn test_dropped_request_emits_cancelled_record() {
    use axum::body::Body;
    use tower::ServiceExt;

    let app = common::spawn_app(|c| {
        c.workloads.slow_min_ms = 5_000;
        c.workloads.slow_max_ms = 5_000;
    })
    .await;
    let router =
        apm_workload::http::HttpServer::with_state(&common::test_config(), app.state.clone())
            .router();

    let request = axum::http::Request::get("/api/slow").body(Body::empty()).unwrap();
    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        router.oneshot(request),
    )
    .await;
    assert!(outcome.is_err());

    let cancelled = app
        .sink
        .records()
        .into_iter()
        .find(|r| r.message == "request cancelled")
        .expect("cancelled record");
    assert_eq!(cancelled.field("outcome"), Some(&FieldValue::from("cancelled")));
    assert_eq!(cancelled.field("path"), Some(&FieldValue::from("/api/slow")));
    assert!(app
        .logs_for(&cancelled.correlation_id)
        .iter()
        .all(|r| r.message != "request completed"));
}
