//! Randomized error, database, service-chain and crash simulations.

use std::time::{Duration, Instant};

use axum::{extract::State, response::Response};
use rand::Rng;
use serde_json::{json, Value};

use super::inject;
use crate::errors::{ErrorRecord, Failure, RuntimeFault};
use crate::faults::{sites, CrashKind, SimulatedCondition, ValidationKind};
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

const DB_OPERATIONS: [&str; 4] = ["SELECT", "INSERT", "UPDATE", "DELETE"];

/// Outcomes of `/api/error-random`, drawn uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RandomOutcome {
    Success,
    BadRequest,
    NotFound,
    ServerError,
    Timeout,
}

impl RandomOutcome {
    const ALL: [RandomOutcome; 5] = [
        RandomOutcome::Success,
        RandomOutcome::BadRequest,
        RandomOutcome::NotFound,
        RandomOutcome::ServerError,
        RandomOutcome::Timeout,
    ];
}

/// `GET /api/error-random`
pub async fn error_random(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_error_random(&state, &log).await)
}

/// `GET /api/database-simulation`
pub async fn database_simulation(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_database(&state, &log).await)
}

/// `GET /api/chain-calls`
pub async fn chain_calls(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_chain(&state, &log).await)
}

/// `GET /api/crash-test`
///
/// Always fails. `CrashKind::Panic` unwinds out of the handler and is
/// answered by the correlation middleware.
pub async fn crash_test(State(state): State<AppState>, log: RequestLog) -> Response {
    let number = state.counters.record("crash-test");
    let kind = state.policy.pick(CrashKind::ALL).unwrap_or(CrashKind::Panic);
    log.warn(
        "crash test triggered",
        crate::fields! {
            "request_number" => number,
            "crash_kind" => kind.as_str(),
        },
    );
    let fault = RuntimeFault::provoke(kind);
    response::failure(&log, Failure::Runtime(fault))
}

async fn run_error_random(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("error-random");
    let outcome = state
        .policy
        .pick(&RandomOutcome::ALL)
        .unwrap_or(RandomOutcome::Success);
    log.debug(
        "random outcome drawn",
        crate::fields! { "outcome" => format!("{:?}", outcome) },
    );

    match outcome {
        RandomOutcome::Success => Ok(json!({
            "message": "Random success",
            "request_number": number,
        })),
        RandomOutcome::BadRequest => {
            let kind = state
                .policy
                .pick(ValidationKind::ALL)
                .unwrap_or(ValidationKind::InvalidFormat);
            Err(Failure::Simulated(SimulatedCondition::ValidationError(kind)).into())
        }
        RandomOutcome::NotFound => Err(ErrorRecord::from(Failure::NotFound {
            path: log.context().path.clone(),
        })
        .with_user_message("Resource not found")
        .with_message("The requested resource does not exist")),
        RandomOutcome::ServerError => {
            let kind = state
                .policy
                .pick(CrashKind::ALL)
                .unwrap_or(CrashKind::NullReference);
            Err(Failure::Simulated(SimulatedCondition::CrashError(kind)).into())
        }
        RandomOutcome::Timeout => {
            let after = Duration::from_millis(state.workloads.error_random_timeout_ms);
            log.warn(
                "simulated timeout",
                crate::fields! { "timeout_ms" => after.as_millis() },
            );
            tokio::time::sleep(after).await;
            Err(Failure::Simulated(SimulatedCondition::Timeout(after)).into())
        }
    }
}

async fn run_database(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("database-simulation");
    let workloads = &state.workloads;
    let operation = state.policy.pick(&DB_OPERATIONS).unwrap_or("SELECT");
    let query_time = state.policy.uniform_delay(workloads.db_min_ms, workloads.db_max_ms);

    log.debug("executing query", crate::fields! { "operation" => operation });
    let slow_query = inject(state, log, sites::DATABASE)
        .await
        .map_err(|record| record.with_detail("operation", operation))?;
    tokio::time::sleep(query_time).await;

    let total = query_time + slow_query.unwrap_or_default();
    let rows_affected: u32 = state.policy.with_rng(|rng| rng.gen_range(1..=100));
    log.info(
        "query completed",
        crate::fields! {
            "request_number" => number,
            "operation" => operation,
            "query_time_ms" => total.as_millis(),
            "rows_affected" => rows_affected,
            "slow_query" => slow_query.is_some(),
        },
    );
    Ok(json!({
        "message": "Database operation completed",
        "request_number": number,
        "operation": operation,
        "query_time": total.as_secs_f64(),
        "rows_affected": rows_affected,
    }))
}

async fn run_chain(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("chain-calls");
    let workloads = &state.workloads;
    let started = Instant::now();
    let mut calls = Vec::with_capacity(workloads.chain_services.len());
    let mut degraded = 0usize;

    for service in &workloads.chain_services {
        let mut delay = state.policy.uniform_delay(workloads.chain_min_ms, workloads.chain_max_ms);
        tokio::time::sleep(delay).await;

        let condition = state.policy.decide(sites::CHAIN_CALLS);
        match condition {
            SimulatedCondition::None => {}
            SimulatedCondition::LatencySpike(extra) => {
                tokio::time::sleep(extra).await;
                delay += extra;
            }
            SimulatedCondition::Unavailable | SimulatedCondition::Timeout(_) => {
                if let SimulatedCondition::Timeout(after) = condition {
                    tokio::time::sleep(after).await;
                    delay += after;
                }
                degraded += 1;
                log.warn(
                    "downstream service degraded",
                    crate::fields! {
                        "service" => service,
                        "condition" => condition.label(),
                    },
                );
                calls.push(json!({
                    "service": service,
                    "status": "degraded",
                    "error": condition.label(),
                    "duration": delay.as_secs_f64(),
                }));
                continue;
            }
            failure => {
                log.warn(
                    "fault injected",
                    crate::fields! {
                        "site" => sites::CHAIN_CALLS,
                        "service" => service,
                        "condition" => failure.label(),
                        "kind" => failure.detail().unwrap_or("none"),
                    },
                );
                return Err(ErrorRecord::from(Failure::Simulated(failure))
                    .with_detail("failed_service", service.as_str())
                    .with_detail("completed_calls", calls.len()));
            }
        }

        log.debug(
            "downstream call succeeded",
            crate::fields! {
                "service" => service,
                "duration_ms" => delay.as_millis(),
            },
        );
        calls.push(json!({
            "service": service,
            "status": "success",
            "duration": delay.as_secs_f64(),
        }));
    }

    let total = started.elapsed();
    log.info(
        "service chain completed",
        crate::fields! {
            "request_number" => number,
            "services" => calls.len(),
            "degraded" => degraded,
            "duration_ms" => total.as_millis(),
        },
    );
    Ok(json!({
        "message": "Chain calls completed",
        "request_number": number,
        "services_called": calls,
        "degraded_services": degraded,
        "total_time": total.as_secs_f64(),
    }))
}
