//! Latency, CPU and memory workloads.

use std::hint::black_box;
use std::time::Instant;

use axum::{extract::State, response::Response};
use serde_json::{json, Value};

use super::inject;
use crate::errors::ErrorRecord;
use crate::faults::sites;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

/// `GET /api/fast`
pub async fn fast(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_fast(&state, &log).await)
}

/// `GET /api/slow`
pub async fn slow(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_slow(&state, &log).await)
}

/// `GET /api/memory-intensive`
pub async fn memory_intensive(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_memory(&state, &log).await)
}

/// `GET /api/cpu-intensive`
pub async fn cpu_intensive(State(state): State<AppState>, log: RequestLog) -> Response {
    response::reply(&log, run_cpu(&state, &log).await)
}

async fn run_fast(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("fast");
    inject(state, log, sites::FAST).await?;

    log.info("fast request processed", crate::fields! { "request_number" => number });
    Ok(json!({
        "message": "Fast response",
        "request_number": number,
    }))
}

async fn run_slow(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("slow");
    let workloads = &state.workloads;
    let base = state.policy.uniform_delay(workloads.slow_min_ms, workloads.slow_max_ms);

    let spike = inject(state, log, sites::SLOW).await?;
    tokio::time::sleep(base).await;
    let actual = base + spike.unwrap_or_default();

    log.info(
        "slow request processed",
        crate::fields! {
            "request_number" => number,
            "delay_ms" => actual.as_millis(),
            "spike" => spike.is_some(),
        },
    );
    Ok(json!({
        "message": "Slow response",
        "request_number": number,
        "actual_delay": actual.as_secs_f64(),
        "latency_spike": spike.is_some(),
    }))
}

async fn run_memory(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("memory-intensive");
    inject(state, log, sites::MEMORY_INTENSIVE).await?;

    let items = state.workloads.memory_items;
    let started = Instant::now();
    let processed = tokio::task::spawn_blocking(move || allocate_and_filter(items)).await?;
    let elapsed = started.elapsed();

    log.info(
        "memory workload completed",
        crate::fields! {
            "request_number" => number,
            "memory_items" => items,
            "processed_items" => processed,
            "duration_ms" => elapsed.as_millis(),
        },
    );
    Ok(json!({
        "message": "Memory intensive operation completed",
        "request_number": number,
        "memory_items": items,
        "processed_items": processed,
        "processing_time": elapsed.as_secs_f64(),
    }))
}

async fn run_cpu(state: &AppState, log: &RequestLog) -> Result<Value, ErrorRecord> {
    let number = state.counters.record("cpu-intensive");
    inject(state, log, sites::CPU_INTENSIVE).await?;

    let iterations = state.workloads.cpu_iterations;
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || sum_of_squares(iterations)).await?;
    let elapsed = started.elapsed();

    log.info(
        "cpu workload completed",
        crate::fields! {
            "request_number" => number,
            "iterations" => iterations,
            "duration_ms" => elapsed.as_millis(),
        },
    );
    Ok(json!({
        "message": "CPU intensive operation completed",
        "request_number": number,
        "iterations": iterations,
        "result": result,
        "processing_time": elapsed.as_secs_f64(),
    }))
}

struct Item {
    id: usize,
    payload: String,
}

/// Build `count` records and count the even ids.
fn allocate_and_filter(count: usize) -> usize {
    let items: Vec<Item> = (0..count)
        .map(|id| Item {
            id,
            payload: format!("item-{:08}-{}", id, "x".repeat(64)),
        })
        .collect();
    black_box(&items)
        .iter()
        .filter(|item| item.id % 2 == 0 && !item.payload.is_empty())
        .count()
}

/// Sum of `i * i` for `i` in `0..n`, wrapping on overflow.
fn sum_of_squares(n: u64) -> u64 {
    (0..black_box(n)).fold(0u64, |acc, i| acc.wrapping_add(i.wrapping_mul(i)))
}
