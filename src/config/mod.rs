//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → subsystems built from it at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps in the new fault site tables
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload never touches the live error rate

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, AppConfig, ExternalConfig, FaultConfig, FileSinkConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, SecurityConfig, TimeoutConfig, TlsConfig, WorkloadConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
