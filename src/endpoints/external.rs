use std::time::Instant;

use axum::{extract::State, response::Response};
use serde_json::{json, Value};

use super::inject;
use crate::errors::ErrorRecord;
use crate::faults::sites;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

/// `GET /api/external-call`
pub async fn external_call(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_external(&state, &log).await)
}

async fn run_external(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("external-call");
    inject(state, log, sites::EXTERNAL_CALL).await?;

    let service = state.external.name();
    log.info("calling external service", crate::fields! { "service" => service });
    let started = Instant::now();
    let payload = state
        .external
        .fetch(log.correlation_id())
        .await
        .map_err(|e| ErrorRecord::from(e).with_detail("service", service))?;
    let elapsed = started.elapsed();

    log.info(
        "external service responded",
        crate::fields! {
            "request_number" => number,
            "service" => service,
            "duration_ms" => elapsed.as_millis(),
        },
    );
    Ok(json!({
        "message": "External API call successful",
        "request_number": number,
        "external_data": payload,
        "response_time": elapsed.as_secs_f64(),
    }))
}
