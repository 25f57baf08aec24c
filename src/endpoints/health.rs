use axum::{extract::State, response::Response};
use serde_json::json;

use super::inject;
use crate::faults::sites;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>, log: RequestLog) -> Response {
    let outcome = match inject(&state, &log, sites::HEALTH).await {
        Ok(_) => Ok(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        })),
        Err(record) => Err(record.with_detail("status", "unhealthy")),
    };
    response::reply(&log, outcome)
}
