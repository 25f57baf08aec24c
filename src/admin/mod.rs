//! Error-rate control API and process statistics.
//!
//! # Design Decisions
//! - A rejected update leaves the live rate untouched
//! - Every accepted update is audit-logged with old and new values
//! - Bearer-key protection applies only to the mutating route

pub mod auth;
pub mod handlers;
pub mod stats;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub use stats::RequestCounters;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/set-error-rate", post(set_error_rate))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/api/get-error-rate", get(get_error_rate))
        .route("/api/stats", get(get_stats))
        .merge(protected)
}
