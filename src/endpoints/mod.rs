//! Synthetic workload endpoints.
//!
//! # Data Flow
//! ```text
//! handler
//!     → counters.record(endpoint)       (request_number)
//!     → inject(site)                    (fault decision, maybe sleep)
//!     → simulated work                  (sleep, CPU, memory, upstream)
//!     → response::reply(Result<Value, ErrorRecord>)
//! ```

pub mod external;
pub mod health;
pub mod security;
pub mod simulation;
pub mod workload;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use crate::errors::{ErrorRecord, Failure};
use crate::faults::SimulatedCondition;
use crate::http::request::RequestLog;
use crate::http::server::AppState;

/// Paths served by this process, reported by `/api/stats`.
pub const ENDPOINTS: &[&str] = &[
    "/health",
    "/api/fast",
    "/api/slow",
    "/api/memory-intensive",
    "/api/cpu-intensive",
    "/api/error-random",
    "/api/database-simulation",
    "/api/chain-calls",
    "/api/external-call",
    "/api/crash-test",
    "/api/security-error",
    "/api/security-input",
    "/api/set-error-rate",
    "/api/get-error-rate",
    "/api/stats",
];

pub fn setup_workload_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/fast", get(workload::fast))
        .route("/api/slow", get(workload::slow))
        .route("/api/memory-intensive", get(workload::memory_intensive))
        .route("/api/cpu-intensive", get(workload::cpu_intensive))
        .route("/api/error-random", get(simulation::error_random))
        .route("/api/database-simulation", get(simulation::database_simulation))
        .route("/api/chain-calls", get(simulation::chain_calls))
        .route("/api/crash-test", get(simulation::crash_test))
        .route("/api/external-call", get(external::external_call))
        .route("/api/security-error", get(security::security_error))
        .route("/api/security-input", post(security::security_input))
}

/// Consult the fault policy at `site` and apply the outcome.
///
/// A latency spike is slept here and its length returned. A timeout sleeps
/// for its duration and then fails. Any other failure is returned at once.
pub(crate) async fn inject(
    state: &AppState,
    log: &RequestLog,
    site: &str,
) -> Result<Option<Duration>, ErrorRecord> {
    let condition = state.policy.decide(site);
    match condition {
        SimulatedCondition::None => Ok(None),
        SimulatedCondition::LatencySpike(delay) => {
            log.warn(
                "latency spike injected",
                crate::fields! {
                    "site" => site,
                    "condition" => condition.label(),
                    "delay_ms" => delay.as_millis(),
                },
            );
            tokio::time::sleep(delay).await;
            Ok(Some(delay))
        }
        SimulatedCondition::Timeout(after) => {
            log.warn(
                "simulated timeout",
                crate::fields! {
                    "site" => site,
                    "condition" => condition.label(),
                    "timeout_ms" => after.as_millis(),
                },
            );
            tokio::time::sleep(after).await;
            Err(ErrorRecord::from(Failure::Simulated(condition)))
        }
        failure => {
            log.warn(
                "fault injected",
                crate::fields! {
                    "site" => site,
                    "condition" => failure.label(),
                    "kind" => failure.detail().unwrap_or("none"),
                },
            );
            Err(ErrorRecord::from(Failure::Simulated(failure)))
        }
    }
}
