//! Security failure simulation and hostile-input inspection.
//!
//! Received input is only measured and pattern-matched; it is never
//! evaluated, executed or reflected unescaped.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap},
    response::Response,
};
use serde_json::{json, Value};

use crate::errors::{ErrorRecord, Failure};
use crate::faults::{SecurityKind, SimulatedCondition};
use crate::http::request::RequestLog;
use crate::http::response;
use crate::http::server::AppState;

const PREVIEW_CHARS: usize = 64;

/// Attack signatures, matched case-insensitively.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("xss", &["<script", "javascript:", "onerror=", "onload="]),
    ("sql_injection", &["' or '1'='1", "union select", "drop table", "'; --", "or 1=1"]),
    ("path_traversal", &["../", "..\\", "%2e%2e%2f"]),
    ("command_injection", &["; rm ", "&& ", "| sh", "$(", "`"]),
];

/// `GET /api/security-error`
pub async fn security_error(State(state): State<AppState>, log: RequestLog) -> Response {
    let number = state.counters.record("security-error");
    let kind = state
        .policy
        .pick(SecurityKind::ALL)
        .unwrap_or(SecurityKind::MissingCredentials);
    log.warn(
        "security violation simulated",
        crate::fields! {
            "request_number" => number,
            "violation" => kind.as_str(),
        },
    );
    response::failure(&log, Failure::Simulated(SimulatedCondition::SecurityError(kind)))
}

/// `POST /api/security-input`
pub async fn security_input(
    State(state): State<AppState>,
    log: RequestLog,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let number = state.counters.record("security-input");
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return response::failure(&log, Failure::InvalidInput(rejection.body_text()));
        }
    };
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    response::reply(&log, inspect(&log, number, content_type, &body))
}

fn inspect(
    log: &RequestLog,
    number: u64,
    content_type: &str,
    body: &[u8],
) -> Result<Value, ErrorRecord> {
    let text = String::from_utf8_lossy(body);
    let parsed = serde_json::from_slice::<Value>(body).ok();
    let top_level_keys: Vec<&str> = match &parsed {
        Some(Value::Object(map)) => map.keys().map(String::as_str).collect(),
        _ => Vec::new(),
    };
    let detected = detect_patterns(&text);

    let fields = crate::fields! {
        "request_number" => number,
        "received_bytes" => body.len(),
        "content_type" => content_type,
        "detected_patterns" => detected.join(","),
    };
    if detected.is_empty() {
        log.info("input inspected", fields);
    } else {
        log.warn("suspicious input detected", fields);
    }

    Ok(json!({
        "message": "Input received and inspected",
        "request_number": number,
        "received_bytes": body.len(),
        "content_type": content_type,
        "valid_json": parsed.is_some(),
        "top_level_keys": top_level_keys,
        "detected_patterns": detected,
        "sanitized_preview": sanitize(&text),
        "executed": false,
    }))
}

/// Names of the signatures found in `input`.
fn detect_patterns(input: &str) -> Vec<&'static str> {
    let lower = input.to_ascii_lowercase();
    SIGNATURES
        .iter()
        .filter(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(name, _)| *name)
        .collect()
}

/// HTML-escaped, control-free prefix of `input`.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(PREVIEW_CHARS);
    for c in input.chars().filter(|c| !c.is_control()).take(PREVIEW_CHARS) {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
