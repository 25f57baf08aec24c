//! Error taxonomy.
//!
//! `classify` is the only place a failure turns into a status code. Each
//! `Failure` variant, and each variant of the conditions and faults inside
//! it, maps to exactly one `ErrorRecord`.

use std::fmt;

use axum::http::StatusCode;
use serde_json::{Map, Value};

use super::{Failure, RuntimeFault};
use crate::external::UpstreamError;
use crate::faults::{ResourceKind, SecurityKind, SimulatedCondition};
use crate::observability::Severity;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ClientInput,
    NotFound,
    Authentication,
    Authorization,
    UpstreamUnavailable,
    ResourceExhaustion,
    InternalFault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClientInput => "ClientInputError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Authorization => "AuthorizationError",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::ResourceExhaustion => "ResourceExhaustion",
            ErrorKind::InternalFault => "InternalFault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to log and answer one failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub status: StatusCode,
    /// Short caller-facing title, the `error` field of the body.
    pub user_message: String,
    /// Machine-readable code.
    pub code: String,
    /// Caller-facing detail, safe to expose.
    pub message: Option<String>,
    /// Logged only, never sent to the caller.
    pub internal_details: Option<String>,
    pub severity: Severity,
    /// Extra body fields supplied by the handler.
    pub extra: Map<String, Value>,
}

impl ErrorRecord {
    fn new(
        kind: ErrorKind,
        status: StatusCode,
        user_message: &str,
        code: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status,
            user_message: user_message.to_string(),
            code: code.into(),
            message: None,
            internal_details: None,
            severity: Severity::Error,
            extra: Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    pub fn with_internal(mut self, details: impl Into<String>) -> Self {
        self.internal_details = Some(details.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    fn critical(mut self) -> Self {
        self.severity = Severity::Critical;
        self
    }

    /// The JSON body, without the per-request envelope.
    pub fn body(&self) -> Value {
        let mut body = self.extra.clone();
        body.insert("error".into(), Value::from(self.user_message.clone()));
        body.insert("code".into(), Value::from(self.code.clone()));
        body.insert("error_type".into(), Value::from(self.kind.as_str()));
        if let Some(message) = &self.message {
            body.insert("message".into(), Value::from(message.clone()));
        }
        Value::Object(body)
    }
}

impl From<Failure> for ErrorRecord {
    fn from(failure: Failure) -> Self {
        classify(&failure)
    }
}

/// Map a failure to its record.
pub fn classify(failure: &Failure) -> ErrorRecord {
    match failure {
        Failure::Simulated(condition) => classify_condition(condition),
        Failure::Runtime(fault) => classify_fault(fault),
        Failure::Upstream(error) => classify_upstream(error),
        Failure::NotFound { path } => ErrorRecord::new(
            ErrorKind::NotFound,
            StatusCode::NOT_FOUND,
            "Endpoint not found",
            "NOT_FOUND",
        )
        .with_message(format!("No route for {}", path)),
        Failure::MethodNotAllowed { method, path } => ErrorRecord::new(
            ErrorKind::ClientInput,
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            "METHOD_NOT_ALLOWED",
        )
        .with_message(format!("{} is not supported on {}", method, path)),
        Failure::InvalidInput(reason) => ErrorRecord::new(
            ErrorKind::ClientInput,
            StatusCode::BAD_REQUEST,
            "Bad Request",
            "INVALID_INPUT",
        )
        .with_message(reason.clone()),
        Failure::Unauthorized(reason) => ErrorRecord::new(
            ErrorKind::Authentication,
            StatusCode::UNAUTHORIZED,
            "Authentication required",
            "UNAUTHORIZED",
        )
        .with_message(reason.clone()),
        Failure::DeadlineExceeded(limit) => ErrorRecord::new(
            ErrorKind::UpstreamUnavailable,
            StatusCode::GATEWAY_TIMEOUT,
            "Request timed out",
            "DEADLINE_EXCEEDED",
        )
        .with_message(format!("Request exceeded the {}s deadline", limit.as_secs())),
    }
}

fn classify_condition(condition: &SimulatedCondition) -> ErrorRecord {
    match condition {
        SimulatedCondition::ValidationError(kind) => ErrorRecord::new(
            ErrorKind::ClientInput,
            StatusCode::BAD_REQUEST,
            "Validation error",
            format!("VALIDATION_{}", kind.as_str().to_uppercase()),
        )
        .with_message(format!("Request failed validation: {}", kind.as_str().replace('_', " "))),
        SimulatedCondition::Timeout(after) => ErrorRecord::new(
            ErrorKind::UpstreamUnavailable,
            StatusCode::GATEWAY_TIMEOUT,
            "Request timed out",
            "TIMEOUT",
        )
        .with_message(format!("Operation gave up after {}ms", after.as_millis())),
        SimulatedCondition::ResourceError(kind) => {
            let status = if kind.is_critical() {
                StatusCode::INSUFFICIENT_STORAGE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let record = ErrorRecord::new(
                ErrorKind::ResourceExhaustion,
                status,
                resource_title(kind),
                format!("RESOURCE_{}", kind.as_str().to_uppercase()),
            )
            .with_message(format!("Resource exhausted: {}", kind.as_str().replace('_', " ")));
            if kind.is_critical() {
                record.critical()
            } else {
                record
            }
        }
        SimulatedCondition::SecurityError(kind) => {
            let (error_kind, status, title) = if kind.is_authentication() {
                (ErrorKind::Authentication, StatusCode::UNAUTHORIZED, "Authentication failed")
            } else {
                (ErrorKind::Authorization, StatusCode::FORBIDDEN, "Access denied")
            };
            ErrorRecord::new(
                error_kind,
                status,
                title,
                format!("SECURITY_{}", kind.as_str().to_uppercase()),
            )
            .with_message(security_message(kind))
        }
        SimulatedCondition::CrashError(kind) => ErrorRecord::new(
            ErrorKind::InternalFault,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "INTERNAL_FAULT",
        )
        .with_message(format!("An unexpected {} fault occurred", kind.as_str()))
        .with_internal(format!("simulated crash: {}", kind))
        .critical(),
        SimulatedCondition::Unavailable => ErrorRecord::new(
            ErrorKind::UpstreamUnavailable,
            StatusCode::SERVICE_UNAVAILABLE,
            "Service unavailable",
            "DEPENDENCY_UNAVAILABLE",
        )
        .with_message("A required dependency is not responding"),
        // Not failures; classified so the mapping stays total.
        SimulatedCondition::None | SimulatedCondition::LatencySpike(_) => ErrorRecord::new(
            ErrorKind::InternalFault,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "INTERNAL_FAULT",
        )
        .with_internal(format!("non-failure condition {} reached the error mapper", condition)),
    }
}

fn classify_fault(fault: &RuntimeFault) -> ErrorRecord {
    ErrorRecord::new(
        ErrorKind::InternalFault,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        "INTERNAL_FAULT",
    )
    .with_message(format!("An unexpected {} fault occurred", fault.category()))
    .with_detail("fault_category", fault.category())
    .with_internal(fault.to_string())
    .critical()
}

fn classify_upstream(error: &UpstreamError) -> ErrorRecord {
    let (status, title, code) = match error {
        UpstreamError::Timeout(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            "External service timed out",
            "UPSTREAM_TIMEOUT",
        ),
        UpstreamError::Unreachable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "External service unavailable",
            "UPSTREAM_UNREACHABLE",
        ),
        UpstreamError::BadStatus(_) => (
            StatusCode::BAD_GATEWAY,
            "External service error",
            "UPSTREAM_BAD_STATUS",
        ),
        UpstreamError::InvalidPayload(_) => (
            StatusCode::BAD_GATEWAY,
            "External service returned an invalid payload",
            "UPSTREAM_INVALID_PAYLOAD",
        ),
        UpstreamError::Request(_) => {
            return ErrorRecord::new(
                ErrorKind::InternalFault,
                StatusCode::INTERNAL_SERVER_ERROR,
                "External API call failed",
                "UPSTREAM_REQUEST",
            )
            .with_internal(error.to_string())
            .critical();
        }
    };
    ErrorRecord::new(ErrorKind::UpstreamUnavailable, status, title, code)
        .with_message("External API call failed")
        .with_internal(error.to_string())
}

fn resource_title(kind: &ResourceKind) -> &'static str {
    match kind {
        ResourceKind::MemoryPressure | ResourceKind::MemoryExhausted => "Out of memory",
        ResourceKind::DiskFull => "Insufficient storage",
        ResourceKind::ConnectionPoolExhausted => "Database connection failed",
    }
}

fn security_message(kind: &SecurityKind) -> &'static str {
    match kind {
        SecurityKind::MissingCredentials => "Missing or invalid credentials",
        SecurityKind::ExpiredToken => "Authentication token has expired",
        SecurityKind::InsufficientPermissions => "Insufficient permissions for this resource",
        SecurityKind::IpBlocked => "Requests from this address are blocked",
    }
}
