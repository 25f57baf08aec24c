//! Simulated conditions produced by a fault decision.
//!
//! A condition is consumed immediately by the handler that asked for it:
//! latency spikes and timeouts alter timing, every other variant ends the
//! request through the error taxonomy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Declares a closed set of condition kinds with a stable snake_case name.
macro_rules! condition_kinds {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable name used in log fields and error codes.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

condition_kinds! {
    /// Client-side input problems.
    ValidationKind {
        MissingField => "missing_field",
        InvalidFormat => "invalid_format",
        OutOfRange => "out_of_range",
    }
}

condition_kinds! {
    /// Exhausted local resources.
    ResourceKind {
        MemoryPressure => "memory_pressure",
        MemoryExhausted => "memory_exhausted",
        DiskFull => "disk_full",
        ConnectionPoolExhausted => "connection_pool_exhausted",
    }
}

condition_kinds! {
    /// Authentication and authorization failures.
    SecurityKind {
        MissingCredentials => "missing_credentials",
        ExpiredToken => "expired_token",
        InsufficientPermissions => "insufficient_permissions",
        IpBlocked => "ip_blocked",
    }
}

condition_kinds! {
    /// Runtime faults a crash can take the shape of.
    CrashKind {
        NullReference => "null_reference",
        IndexOutOfBounds => "index_out_of_bounds",
        DivisionByZero => "division_by_zero",
        TypeMismatch => "type_mismatch",
        MissingKey => "missing_key",
        Panic => "panic",
    }
}

impl ResourceKind {
    /// Whether the exhaustion leaves the process unable to serve at all.
    pub fn is_critical(&self) -> bool {
        matches!(self, ResourceKind::MemoryExhausted | ResourceKind::DiskFull)
    }
}

impl SecurityKind {
    /// True for failures to establish identity, false for denied access.
    pub fn is_authentication(&self) -> bool {
        matches!(self, SecurityKind::MissingCredentials | SecurityKind::ExpiredToken)
    }
}

/// Outcome of one fault decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedCondition {
    None,
    LatencySpike(Duration),
    Timeout(Duration),
    ValidationError(ValidationKind),
    ResourceError(ResourceKind),
    SecurityError(SecurityKind),
    CrashError(CrashKind),
    /// A dependency the endpoint relies on is down.
    Unavailable,
}

impl SimulatedCondition {
    pub fn is_none(&self) -> bool {
        matches!(self, SimulatedCondition::None)
    }

    /// Conditions that end the request with an error response.
    pub fn is_failure(&self) -> bool {
        !matches!(self, SimulatedCondition::None | SimulatedCondition::LatencySpike(_))
    }

    /// Category label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            SimulatedCondition::None => "none",
            SimulatedCondition::LatencySpike(_) => "latency_spike",
            SimulatedCondition::Timeout(_) => "timeout",
            SimulatedCondition::ValidationError(_) => "validation_error",
            SimulatedCondition::ResourceError(_) => "resource_error",
            SimulatedCondition::SecurityError(_) => "security_error",
            SimulatedCondition::CrashError(_) => "crash_error",
            SimulatedCondition::Unavailable => "unavailable",
        }
    }

    /// The kind carried by the variant, if any.
    pub fn detail(&self) -> Option<&'static str> {
        match self {
            SimulatedCondition::ValidationError(k) => Some(k.as_str()),
            SimulatedCondition::ResourceError(k) => Some(k.as_str()),
            SimulatedCondition::SecurityError(k) => Some(k.as_str()),
            SimulatedCondition::CrashError(k) => Some(k.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for SimulatedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatedCondition::LatencySpike(d) | SimulatedCondition::Timeout(d) => {
                write!(f, "{}({}ms)", self.label(), d.as_millis())
            }
            other => match other.detail() {
                Some(detail) => write!(f, "{}({})", other.label(), detail),
                None => f.write_str(other.label()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert!(!SimulatedCondition::None.is_failure());
        assert!(!SimulatedCondition::LatencySpike(Duration::from_millis(5)).is_failure());
        assert!(SimulatedCondition::Timeout(Duration::from_millis(5)).is_failure());
        assert!(SimulatedCondition::Unavailable.is_failure());
        assert!(SimulatedCondition::CrashError(CrashKind::Panic).is_failure());
    }

    #[test]
    fn test_display() {
        let spike = SimulatedCondition::LatencySpike(Duration::from_millis(250));
        assert_eq!(spike.to_string(), "latency_spike(250ms)");
        let denied = SimulatedCondition::SecurityError(SecurityKind::IpBlocked);
        assert_eq!(denied.to_string(), "security_error(ip_blocked)");
        assert_eq!(SimulatedCondition::Unavailable.to_string(), "unavailable");
    }

    #[test]
    fn test_kind_names_round_trip_through_serde() {
        let kinds: Vec<CrashKind> = serde_json::from_str(r#"["panic", "missing_key"]"#).unwrap();
        assert_eq!(kinds, vec![CrashKind::Panic, CrashKind::MissingKey]);
        assert_eq!(CrashKind::ALL.len(), 6);
    }
}
