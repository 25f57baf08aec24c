//! Structured log emitter.
//!
//! Renders a record once and writes it to every configured sink. A failing
//! sink never reaches the caller: the failure is counted, reported through
//! `tracing`, and the remaining sinks still receive the record.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::record::{Fields, LogRecord, Severity};
use super::sinks::{FileSink, LogSink, SinkError, TracingSink};
use crate::config::schema::ObservabilityConfig;

pub struct LogEmitter {
    logger: String,
    sinks: Vec<Arc<dyn LogSink>>,
    sink_failures: AtomicU64,
}

impl LogEmitter {
    /// An emitter with no sinks.
    pub fn new(logger: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
            sinks: Vec::new(),
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Console sink always, file sink when enabled.
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, SinkError> {
        let mut emitter = Self::new(config.logger_name.clone()).with_sink(Arc::new(TracingSink));
        if config.file.enabled {
            emitter = emitter.with_sink(Arc::new(FileSink::rolling(&config.file)?));
        }
        Ok(emitter)
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// Total failed sink writes since start.
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Render and write one record. Never fails.
    pub fn emit(&self, severity: Severity, message: &str, correlation_id: &str, fields: Fields) {
        let record = LogRecord {
            timestamp: Utc::now(),
            logger: self.logger.clone(),
            severity,
            message: message.to_string(),
            correlation_id: correlation_id.to_string(),
            fields,
        };

        for sink in &self.sinks {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.write(&record)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "sink panicked".to_string(),
            };
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                sink = sink.name(),
                correlation_id = correlation_id,
                severity = %severity,
                error = %error,
                "Dropped structured log record"
            );
        }
    }
}
