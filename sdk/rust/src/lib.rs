//! Client for the apm-workload control API.

pub mod client;

pub use client::{ErrorRate, ErrorRateUpdate, SdkError, Stats, WorkloadClient};
