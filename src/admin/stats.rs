//! Request counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Process-wide request counts, total and per endpoint.
#[derive(Debug, Default)]
pub struct RequestCounters {
    total: AtomicU64,
    per_endpoint: DashMap<String, u64>,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request to `endpoint` and return its process-wide number.
    pub fn record(&self, endpoint: &str) -> u64 {
        *self.per_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Snapshot of per-endpoint counts, sorted by endpoint.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.per_endpoint
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
