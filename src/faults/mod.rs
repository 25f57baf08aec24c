//! Fault-injection subsystem.
//!
//! # Data Flow
//! ```text
//! handler reaches a decision point
//!     → policy.rs (read error rate, load site table, draw)
//!     → profile.rs (cumulative thresholds over the site's rules)
//!     → condition.rs (SimulatedCondition handed back to the handler)
//!
//! Error-rate control API
//!     → policy.rs set_error_rate (validated, atomic swap)
//!
//! Config reload
//!     → policy.rs replace_profile (ArcSwap of the site tables)
//! ```
//!
//! # Design Decisions
//! - Every condition probability is `rate * share`, so moving the single
//!   error-rate knob scales all conditions proportionally
//! - Separate sites inside one handler are independent draws
//! - Deterministic in tests through a seeded generator

pub mod condition;
pub mod policy;
pub mod profile;

pub use condition::{CrashKind, ResourceKind, SecurityKind, SimulatedCondition, ValidationKind};
pub use policy::{FaultPolicy, PolicyError};
pub use profile::{sites, FaultEffect, FaultProfile, FaultRule};
