//! Response construction.
//!
//! # Responsibilities
//! - Stamp every JSON body with `request_id` and an ISO-8601 `timestamp`
//! - Log every error response at ERROR or CRITICAL before returning it
//!
//! # Design Decisions
//! - Handlers return `Result<Value, ErrorRecord>`; only this module turns
//!   either side into a `Response`
//! - Internal details of a fault go to the log, never into the body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::request::RequestLog;
use crate::errors::{ErrorRecord, Failure};
use crate::observability::Severity;

fn stamp(log: &RequestLog, body: Value) -> Value {
    let mut object = match body {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    object.insert("request_id".into(), Value::from(log.correlation_id()));
    object.insert(
        "timestamp".into(),
        Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(object)
}

/// 200 with a stamped body.
pub fn ok(log: &RequestLog, body: Value) -> Response {
    success(log, StatusCode::OK, body)
}

pub fn success(log: &RequestLog, status: StatusCode, body: Value) -> Response {
    (status, Json(stamp(log, body))).into_response()
}

/// Log `record` and answer with its status and body.
pub fn error(log: &RequestLog, record: ErrorRecord) -> Response {
    let severity = match record.severity {
        Severity::Critical => Severity::Critical,
        _ => Severity::Error,
    };
    let mut fields = crate::fields! {
        "error_type" => record.kind.as_str(),
        "error_code" => &record.code,
        "status" => record.status.as_u16(),
    };
    if let Some(message) = &record.message {
        fields.insert("error_message".into(), message.into());
    }
    if let Some(details) = &record.internal_details {
        fields.insert("internal_details".into(), details.into());
    }
    log.emit(severity, &record.user_message, fields);

    (record.status, Json(stamp(log, record.body()))).into_response()
}

pub fn failure(log: &RequestLog, failure: Failure) -> Response {
    error(log, ErrorRecord::from(failure))
}

/// Answer a handler outcome.
pub fn reply(log: &RequestLog, outcome: Result<Value, ErrorRecord>) -> Response {
    match outcome {
        Ok(body) => ok(log, body),
        Err(record) => error(log, record),
    }
}
