//! Destinations for structured log records.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

use super::record::{LogRecord, Severity};
use crate::config::schema::FileSinkConfig;

/// Target under which the console sink re-emits records.
pub const EVENT_TARGET: &str = "apm_workload::events";

/// Errors a sink may report. The emitter swallows them.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("file sink could not be initialised: {0}")]
    Init(#[from] InitError),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// A destination for rendered records.
///
/// Writes are synchronous; implementations serialize their own writers so
/// records reach the destination in call order.
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;
    fn write(&self, record: &LogRecord) -> Result<(), SinkError>;
}

/// Console sink: hands each record to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let fields = serde_json::to_string(&record.fields)?;
        let id = record.correlation_id.as_str();
        let logger = record.logger.as_str();
        let message = record.message.as_str();
        match record.severity {
            Severity::Debug => {
                tracing::debug!(
                    target: EVENT_TARGET,
                    correlation_id = id,
                    logger,
                    fields = %fields,
                    "{}",
                    message
                )
            }
            Severity::Info => {
                tracing::info!(
                    target: EVENT_TARGET,
                    correlation_id = id,
                    logger,
                    fields = %fields,
                    "{}",
                    message
                )
            }
            Severity::Warn => {
                tracing::warn!(
                    target: EVENT_TARGET,
                    correlation_id = id,
                    logger,
                    fields = %fields,
                    "{}",
                    message
                )
            }
            Severity::Error => {
                tracing::error!(
                    target: EVENT_TARGET,
                    correlation_id = id,
                    logger,
                    fields = %fields,
                    "{}",
                    message
                )
            }
            Severity::Critical => {
                tracing::error!(
                    target: EVENT_TARGET,
                    critical = true,
                    correlation_id = id,
                    logger,
                    fields = %fields,
                    "{}",
                    message
                )
            }
        }
        Ok(())
    }
}

/// Rotation schedule for the file sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<RotationPolicy> for Rotation {
    fn from(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Minutely => Rotation::MINUTELY,
            RotationPolicy::Hourly => Rotation::HOURLY,
            RotationPolicy::Daily => Rotation::DAILY,
            RotationPolicy::Never => Rotation::NEVER,
        }
    }
}

/// One JSON record per line in a rotating file.
pub struct FileSink {
    writer: Mutex<RollingFileAppender>,
}

impl FileSink {
    pub fn rolling(config: &FileSinkConfig) -> Result<Self, SinkError> {
        std::fs::create_dir_all(&config.directory)?;
        let appender = RollingFileAppender::builder()
            .rotation(config.rotation.into())
            .filename_prefix(config.prefix.clone())
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.directory)?;
        Ok(Self {
            writer: Mutex::new(appender),
        })
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory; used to inspect emitted output.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Records carrying `correlation_id`, in emission order.
    pub fn for_correlation(&self, correlation_id: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
