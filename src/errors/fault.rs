//! Genuine runtime faults.

use std::any::Any;
use std::collections::HashMap;
use std::hint::black_box;

use thiserror::Error;

use crate::faults::CrashKind;

/// A fault raised by real code rather than a policy decision.
#[derive(Debug, Error)]
pub enum RuntimeFault {
    #[error("null reference: {0}")]
    NullReference(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("division by zero: {0}")]
    DivisionByZero(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(#[from] serde_json::Error),

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("panic: {0}")]
    Panic(String),

    #[error("background task failed: {0}")]
    TaskFailure(String),

    #[error("{0}")]
    Unclassified(String),
}

impl RuntimeFault {
    /// Category name surfaced to callers in place of internal detail.
    pub fn category(&self) -> &'static str {
        match self {
            RuntimeFault::NullReference(_) => "NullReference",
            RuntimeFault::IndexOutOfBounds(_) => "IndexOutOfBounds",
            RuntimeFault::DivisionByZero(_) => "DivisionByZero",
            RuntimeFault::TypeMismatch(_) => "TypeMismatch",
            RuntimeFault::MissingKey(_) => "MissingKey",
            RuntimeFault::Panic(_) => "Panic",
            RuntimeFault::TaskFailure(_) => "TaskFailure",
            RuntimeFault::Unclassified(_) => "Unclassified",
        }
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        RuntimeFault::Panic(message)
    }

    /// Run the operation `kind` describes and return the fault it raised.
    ///
    /// `CrashKind::Panic` does not return: it unwinds to the outermost
    /// request boundary.
    pub fn provoke(kind: CrashKind) -> RuntimeFault {
        match kind {
            CrashKind::NullReference => {
                let session: Option<&str> = black_box(None);
                match session {
                    Some(s) => RuntimeFault::Unclassified(format!("unexpected session {}", s)),
                    None => {
                        RuntimeFault::NullReference("session handle was never initialised".into())
                    }
                }
            }
            CrashKind::IndexOutOfBounds => {
                let items = black_box(vec![1u32, 2, 3]);
                let index = black_box(10usize);
                match items.get(index) {
                    Some(v) => RuntimeFault::Unclassified(format!("unexpected item {}", v)),
                    None => RuntimeFault::IndexOutOfBounds(format!(
                        "index {} on a list of length {}",
                        index,
                        items.len()
                    )),
                }
            }
            CrashKind::DivisionByZero => {
                let total = black_box(100i64);
                let divisor = black_box(0i64);
                match total.checked_div(divisor) {
                    Some(q) => RuntimeFault::Unclassified(format!("unexpected quotient {}", q)),
                    None => RuntimeFault::DivisionByZero(format!("{} / {}", total, divisor)),
                }
            }
            CrashKind::TypeMismatch => {
                match serde_json::from_str::<u64>(black_box("\"forty-two\"")) {
                    Ok(v) => RuntimeFault::Unclassified(format!("unexpected number {}", v)),
                    Err(e) => RuntimeFault::TypeMismatch(e),
                }
            }
            CrashKind::MissingKey => {
                let settings: HashMap<&str, &str> = black_box(HashMap::from([("region", "eu")]));
                match settings.get("api_token") {
                    Some(v) => RuntimeFault::Unclassified(format!("unexpected token {}", v)),
                    None => RuntimeFault::MissingKey("api_token".into()),
                }
            }
            CrashKind::Panic => panic!("simulated crash: unhandled fault in request handler"),
        }
    }
}

impl From<tokio::task::JoinError> for RuntimeFault {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            RuntimeFault::from_panic(e.into_panic())
        } else {
            RuntimeFault::TaskFailure(e.to_string())
        }
    }
}
