//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers, state)
//!     → middleware/correlation.rs (correlation id, deadline, panic boundary)
//!     → request.rs (CorrelationContext, RequestLog extractor)
//!     → endpoints / admin handlers
//!     → response.rs (stamp request_id + timestamp, log errors)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CorrelationContext, RequestId, RequestLog, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
