//! External service collaborator.
//!
//! # Responsibilities
//! - Fetch a JSON payload from a third-party endpoint
//! - Bound every call with a deadline
//! - Report failures as a small closed set the taxonomy can map
//!
//! # Design Decisions
//! - Trait seam so tests can substitute a scripted upstream
//! - Correlation id is forwarded as `x-request-id`

pub mod client;

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

pub use client::HttpExternalService;

/// Outcomes of an outbound call other than success.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream returned status {0}")]
    BadStatus(u16),

    #[error("upstream payload was not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("request to upstream could not be built: {0}")]
    Request(String),
}

/// An opaque outbound dependency.
pub trait ExternalService: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    /// Fetch the upstream payload on behalf of request `correlation_id`.
    fn fetch<'a>(&'a self, correlation_id: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>>;
}
