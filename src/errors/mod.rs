//! Failure handling.
//!
//! # Data Flow
//! ```text
//! simulated condition | runtime fault | upstream error | routing miss
//!     → Failure (closed enum)
//!     → taxonomy.rs classify() → ErrorRecord
//!     → http::response::error() (log at ERROR/CRITICAL, JSON body)
//! ```

pub mod fault;
pub mod taxonomy;

use std::time::Duration;

pub use fault::RuntimeFault;
pub use taxonomy::{classify, ErrorKind, ErrorRecord};

use crate::external::UpstreamError;
use crate::faults::SimulatedCondition;

/// Every way a request can fail.
#[derive(Debug)]
pub enum Failure {
    Simulated(SimulatedCondition),
    Runtime(RuntimeFault),
    Upstream(UpstreamError),
    NotFound { path: String },
    MethodNotAllowed { method: String, path: String },
    InvalidInput(String),
    Unauthorized(String),
    DeadlineExceeded(Duration),
}

impl From<SimulatedCondition> for Failure {
    fn from(condition: SimulatedCondition) -> Self {
        Failure::Simulated(condition)
    }
}

impl From<RuntimeFault> for Failure {
    fn from(fault: RuntimeFault) -> Self {
        Failure::Runtime(fault)
    }
}

impl From<UpstreamError> for Failure {
    fn from(error: UpstreamError) -> Self {
        Failure::Upstream(error)
    }
}

impl From<RuntimeFault> for ErrorRecord {
    fn from(fault: RuntimeFault) -> Self {
        classify(&Failure::Runtime(fault))
    }
}

impl From<UpstreamError> for ErrorRecord {
    fn from(error: UpstreamError) -> Self {
        classify(&Failure::Upstream(error))
    }
}

impl From<tokio::task::JoinError> for ErrorRecord {
    fn from(error: tokio::task::JoinError) -> Self {
        ErrorRecord::from(RuntimeFault::from(error))
    }
}
