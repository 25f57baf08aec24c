use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::errors::Failure;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

/// Require `Authorization: Bearer <api_key>` when a key is configured.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    log: RequestLog,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_key) = state.admin.api_key.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == api_key => next.run(request).await,
        Some(_) => response::failure(&log, Failure::Unauthorized("Invalid API key".into())),
        None => response::failure(&log, Failure::Unauthorized("Missing bearer token".into())),
    }
}
