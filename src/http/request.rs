//! Request correlation.
//!
//! # Responsibilities
//! - Generate the per-request correlation id (UUID v4)
//! - Capture request metadata at entry (method, path, remote address)
//! - Hand handlers a logger already bound to that id
//!
//! # Design Decisions
//! - The context is created once by the correlation middleware and stored
//!   in request extensions; handlers receive it through the `RequestLog`
//!   extractor instead of a parameter at every call site
//! - An inbound `x-request-id` is recorded but never adopted as our id

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap, HeaderName, Method, Request, Uri};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::observability::{Fields, LogEmitter, Severity};

/// Header carrying the correlation id on responses and outbound calls.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque per-request token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable metadata of one in-flight request.
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub id: RequestId,
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
    /// `x-request-id` supplied by the caller, if any.
    pub client_request_id: Option<String>,
    pub started_at: Instant,
    pub started_wall: DateTime<Utc>,
}

impl CorrelationContext {
    /// Start a context for `request`.
    pub fn begin<B>(request: &Request<B>) -> Self {
        Self::capture(request.method(), request.uri(), request.headers(), request.extensions())
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::capture(&parts.method, &parts.uri, &parts.headers, &parts.extensions)
    }

    fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, extensions: &Extensions) -> Self {
        let remote_addr = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client_request_id = headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            id: RequestId::new(),
            method: method.clone(),
            path: uri.path().to_string(),
            remote_addr,
            client_request_id,
            started_at: Instant::now(),
            started_wall: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Fields attached to every record of this request.
    pub fn scoped_fields(&self) -> Fields {
        let remote = self
            .remote_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        crate::fields! {
            "method" => self.method.as_str(),
            "path" => &self.path,
            "remote_addr" => remote,
        }
    }
}

/// Structured logger bound to one request.
#[derive(Clone)]
pub struct RequestLog {
    ctx: Arc<CorrelationContext>,
    emitter: Arc<LogEmitter>,
}

impl RequestLog {
    pub fn new(ctx: Arc<CorrelationContext>, emitter: Arc<LogEmitter>) -> Self {
        Self { ctx, emitter }
    }

    pub fn context(&self) -> &CorrelationContext {
        &self.ctx
    }

    pub fn correlation_id(&self) -> &str {
        self.ctx.correlation_id()
    }

    /// Emit one record. Per-call fields win over request-scoped ones.
    pub fn emit(&self, severity: Severity, message: &str, fields: Fields) {
        let mut merged = self.ctx.scoped_fields();
        merged.extend(fields);
        self.emitter.emit(severity, message, self.ctx.correlation_id(), merged);
    }

    pub fn debug(&self, message: &str, fields: Fields) {
        self.emit(Severity::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Fields) {
        self.emit(Severity::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Fields) {
        self.emit(Severity::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Fields) {
        self.emit(Severity::Error, message, fields);
    }

    pub fn critical(&self, message: &str, fields: Fields) {
        self.emit(Severity::Critical, message, fields);
    }
}

impl<S> FromRequestParts<S> for RequestLog
where
    Arc<LogEmitter>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(log) = parts.extensions.get::<RequestLog>() {
            return Ok(log.clone());
        }
        // Router used without the correlation middleware.
        let ctx = Arc::new(CorrelationContext::from_parts(parts));
        let log = RequestLog::new(ctx, Arc::<LogEmitter>::from_ref(state));
        parts.extensions.insert(log.clone());
        Ok(log)
    }
}
