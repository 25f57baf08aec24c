//! Configuration validation.
//!
//! Serde handles syntax; this module checks ranges and cross-field rules.
//! Every problem is reported, not just the first, and nothing is applied
//! until the whole config passes.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::faults::{FaultEffect, FaultRule};

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed config.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are required",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.external_call_secs == 0 {
        errors.push(ValidationError::new("timeouts.external_call_secs", "must be greater than 0"));
    }

    let file = &config.observability.file;
    if file.enabled {
        if file.prefix.trim().is_empty() {
            errors.push(ValidationError::new("observability.file.prefix", "must not be empty"));
        }
        if file.max_files == 0 {
            errors.push(ValidationError::new("observability.file.max_files", "must be at least 1"));
        }
    }
    if config.observability.logger_name.trim().is_empty() {
        errors.push(ValidationError::new("observability.logger_name", "must not be empty"));
    }

    let rate = config.faults.default_error_rate;
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        errors.push(ValidationError::new(
            "faults.default_error_rate",
            format!("{} is outside [0, 100]", rate),
        ));
    }
    for (site, rules) in &config.faults.sites {
        validate_site(site, rules, &mut errors);
    }

    let w = &config.workloads;
    check_range("workloads.slow", w.slow_min_ms, w.slow_max_ms, &mut errors);
    check_range("workloads.db", w.db_min_ms, w.db_max_ms, &mut errors);
    check_range("workloads.chain", w.chain_min_ms, w.chain_max_ms, &mut errors);
    if w.chain_services.is_empty() {
        errors.push(ValidationError::new(
            "workloads.chain_services",
            "must list at least one service",
        ));
    }

    match url::Url::parse(&config.external.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "external.url",
            format!("scheme '{}' is not supported, use http or https", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("external.url", e.to_string())),
    }

    if let Some(key) = &config.admin.api_key {
        if key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be blank when set"));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_site(site: &str, rules: &[FaultRule], errors: &mut Vec<ValidationError>) {
    let mut total = 0.0;
    for (i, rule) in rules.iter().enumerate() {
        let field = format!("faults.sites.{}[{}]", site, i);
        if !rule.share.is_finite() || rule.share <= 0.0 || rule.share > 1.0 {
            errors.push(ValidationError::new(
                &field,
                format!("share {} is outside (0, 1]", rule.share),
            ));
        } else {
            total += rule.share;
        }
        if let FaultEffect::LatencySpike { min_ms, max_ms } = rule.effect {
            if min_ms > max_ms {
                errors.push(ValidationError::new(&field, "min_ms is greater than max_ms"));
            }
        }
    }
    if total > 1.0 + 1e-9 {
        errors.push(ValidationError::new(
            format!("faults.sites.{}", site),
            format!("shares add up to {:.3}, more than 1", total),
        ));
    }
}

fn check_range(field: &str, min: u64, max: u64, errors: &mut Vec<ValidationError>) {
    if min > max {
        errors.push(ValidationError::new(
            field,
            format!("min ({}) is greater than max ({})", min, max),
        ));
    }
}
