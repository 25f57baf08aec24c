//! Startup errors.
//!
//! Any failure while building the shared state is fatal: the process exits
//! before the listener accepts traffic.

use thiserror::Error;

use crate::external::UpstreamError;
use crate::faults::PolicyError;
use crate::observability::SinkError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("log sink could not be initialised: {0}")]
    Sink(#[from] SinkError),

    #[error("invalid fault policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("invalid external service: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("TLS setup failed: {0}")]
    Tls(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
