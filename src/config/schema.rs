//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! workload service. All types derive Serde traits for deserialization
//! from config files, and every field has a default.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::faults::{FaultPolicy, FaultProfile, FaultRule};
use crate::observability::sinks::RotationPolicy;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Request and outbound-call deadlines.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Fault-injection settings.
    pub faults: FaultConfig,

    /// Simulated workload sizes and delays.
    pub workloads: WorkloadConfig,

    /// External service collaborator.
    pub external: ExternalConfig,

    /// Error-rate control API protection.
    pub admin: AdminConfig,

    /// Input limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole request, in seconds. Exceeding it yields 504.
    pub request_secs: u64,

    /// Deadline for the outbound call to the external service, in seconds.
    pub external_call_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            external_call_secs: 10,
        }
    }
}

/// Output format of the diagnostic subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Console output format.
    pub log_format: LogFormat,

    /// Value of the `logger` field on every structured record.
    pub logger_name: String,

    /// Rotating JSON file sink.
    pub file: FileSinkConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            logger_name: "apm_workload".to_string(),
            file: FileSinkConfig::default(),
        }
    }
}

/// File sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub enabled: bool,

    /// Directory holding the log files.
    pub directory: PathBuf,

    /// File name prefix; files are named `<prefix>.<date>.log`.
    pub prefix: String,

    pub rotation: RotationPolicy,

    /// Number of rotated files kept.
    pub max_files: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("/var/log/apm-workload"),
            prefix: "app".to_string(),
            rotation: RotationPolicy::Daily,
            max_files: 7,
        }
    }
}

/// Fault-injection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Error rate at startup, in percent.
    pub default_error_rate: f64,

    /// Seed for the decision generator; random when absent.
    pub seed: Option<u64>,

    /// Site tables replacing the built-in ones of the same name.
    pub sites: BTreeMap<String, Vec<FaultRule>>,
}

impl FaultConfig {
    /// Built-in tables with configured sites applied on top.
    pub fn profile(&self) -> FaultProfile {
        FaultProfile::builtin().merged(&self.sites)
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            default_error_rate: FaultPolicy::DEFAULT_ERROR_RATE,
            seed: None,
            sites: BTreeMap::new(),
        }
    }
}

/// Sizes and delays of the simulated workloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub slow_min_ms: u64,
    pub slow_max_ms: u64,

    /// Loop length of the CPU workload.
    pub cpu_iterations: u64,

    /// Records allocated by the memory workload.
    pub memory_items: usize,

    pub db_min_ms: u64,
    pub db_max_ms: u64,

    /// Downstream services called in order by the chain workload.
    pub chain_services: Vec<String>,
    pub chain_min_ms: u64,
    pub chain_max_ms: u64,

    /// Sleep before the simulated 504 of the random-error endpoint.
    pub error_random_timeout_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            slow_min_ms: 1_000,
            slow_max_ms: 3_000,
            cpu_iterations: 1_000_000,
            memory_items: 100_000,
            db_min_ms: 100,
            db_max_ms: 1_500,
            chain_services: vec![
                "user-service".to_string(),
                "order-service".to_string(),
                "payment-service".to_string(),
                "notification-service".to_string(),
            ],
            chain_min_ms: 100,
            chain_max_ms: 500,
            error_random_timeout_ms: 5_000,
        }
    }
}

/// External service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// HTTP or HTTPS URL fetched by `/api/external-call`.
    pub url: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            url: "https://httpbin.org/json".to_string(),
        }
    }
}

/// Error-rate control API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// When set, `POST /api/set-error-rate` requires `Authorization: Bearer <key>`.
    pub api_key: Option<String>,
}

/// Input limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}
