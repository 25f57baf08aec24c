//! APM workload generator.
//!
//! An HTTP service whose latency, error rate and resource usage are
//! randomized and tunable at runtime, for exercising APM and
//! log-correlation pipelines.

// Core subsystems
pub mod config;
pub mod faults;
pub mod http;
pub mod net;

// Request handling
pub mod admin;
pub mod endpoints;
pub mod errors;
pub mod external;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
