//! Correlation middleware.
//!
//! Outermost request boundary. Every request passing through here gets a
//! correlation id, a `request started` record, and exactly one terminal
//! record: `request completed` or, if the future is dropped, `request
//! cancelled`. Handler panics and the request deadline are converted into
//! error responses here.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use crate::errors::{Failure, RuntimeFault};
use crate::http::request::{CorrelationContext, RequestLog, X_REQUEST_ID};
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::Severity;

pub async fn correlation_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = Arc::new(CorrelationContext::begin(&request));
    let log = RequestLog::new(ctx.clone(), state.emitter.clone());
    request.extensions_mut().insert(log.clone());

    let mut started = crate::fields! {};
    if let Some(client_id) = &ctx.client_request_id {
        started.insert("client_request_id".into(), client_id.into());
    }
    log.info("request started", started);

    let guard = CompletionGuard::new(log.clone());
    let outcome = tokio::time::timeout(
        state.request_timeout,
        AssertUnwindSafe(next.run(request)).catch_unwind(),
    )
    .await;

    let (mut response, label) = match outcome {
        Ok(Ok(response)) => (response, "completed"),
        Ok(Err(panic)) => {
            let fault = RuntimeFault::from_panic(panic);
            (response::failure(&log, Failure::Runtime(fault)), "panicked")
        }
        Err(_) => (
            response::failure(&log, Failure::DeadlineExceeded(state.request_timeout)),
            "timed_out",
        ),
    };

    if let Ok(value) = HeaderValue::from_str(log.correlation_id()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    guard.finish(response.status(), label);
    response
}

/// Emits `request cancelled` unless `finish` ran first.
struct CompletionGuard {
    log: RequestLog,
    finished: bool,
}

impl CompletionGuard {
    fn new(log: RequestLog) -> Self {
        Self { log, finished: false }
    }

    fn finish(mut self, status: StatusCode, outcome: &'static str) {
        self.finished = true;
        let severity = if status.is_server_error() {
            Severity::Error
        } else if status.is_client_error() {
            Severity::Warn
        } else {
            Severity::Info
        };
        self.log.emit(
            severity,
            "request completed",
            crate::fields! {
                "status" => status.as_u16(),
                "duration_ms" => self.log.context().elapsed().as_millis(),
                "outcome" => outcome,
            },
        );
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.log.warn(
            "request cancelled",
            crate::fields! {
                "duration_ms" => self.log.context().elapsed().as_millis(),
                "outcome" => "cancelled",
            },
        );
    }
}
