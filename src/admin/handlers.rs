use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::endpoints::ENDPOINTS;
use crate::errors::Failure;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SetErrorRateRequest {
    pub error_rate: f64,
}

/// `POST /api/set-error-rate`
pub async fn set_error_rate(
    State(state): State<AppState>,
    log: RequestLog,
    payload: Result<Json<SetErrorRateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return response::failure(
                &log,
                Failure::InvalidInput(format!(
                    "Expected a JSON body {{\"error_rate\": number}}: {}",
                    rejection.body_text()
                )),
            );
        }
    };

    match state.policy.set_error_rate(request.error_rate) {
        Ok(previous) => {
            log.info(
                "error rate changed",
                crate::fields! {
                    "old_error_rate" => previous,
                    "new_error_rate" => request.error_rate,
                },
            );
            response::ok(
                &log,
                json!({
                    "message": format!("Error rate updated to {}%", request.error_rate),
                    "old_error_rate": previous,
                    "new_error_rate": request.error_rate,
                }),
            )
        }
        Err(e) => response::failure(&log, Failure::InvalidInput(e.to_string())),
    }
}

/// `GET /api/get-error-rate`
pub async fn get_error_rate(State(state): State<AppState>, log: RequestLog) -> Response {
    response::ok(&log, json!({ "current_error_rate": state.policy.error_rate() }))
}

/// `GET /api/stats`
pub async fn get_stats(State(state): State<AppState>, log: RequestLog) -> Response {
    let total = state.counters.total();
    log.info("stats requested", crate::fields! { "total_requests" => total });
    response::ok(
        &log,
        json!({
            "total_requests": total,
            "endpoints": state.counters.snapshot(),
            "current_error_rate": state.policy.error_rate(),
            "log_sink_failures": state.emitter.sink_failures(),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "available_endpoints": ENDPOINTS,
        }),
    )
}
