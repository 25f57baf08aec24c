//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path:
//!     → http::request::RequestLog (correlation id + request-scoped fields)
//!     → emitter.rs (render fixed-schema LogRecord)
//!     → sinks.rs (console via tracing, rotating JSON file)
//!
//! Process lifecycle:
//!     → logging.rs (tracing subscriber, stdout)
//! ```
//!
//! # Design Decisions
//! - Record field names are a stable contract with log shippers
//! - Sink failures are counted and reported, never propagated
//! - No metrics are collected here; downstream tooling derives them

pub mod emitter;
pub mod logging;
pub mod record;
pub mod sinks;

pub use emitter::LogEmitter;
pub use record::{FieldValue, Fields, LogRecord, Severity};
pub use sinks::{FileSink, LogSink, MemorySink, SinkError, TracingSink};
