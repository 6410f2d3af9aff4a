//! Thought schema validation
//!
//! Validates an untrusted JSON candidate against the `thought.v0` structural
//! rules and, on success, returns the decoded [`Thought`]. Checks run in a
//! fixed order and stop at the first failure, which is reported as a single
//! human-readable reason. Validation is pure: no logging, no side effects,
//! and malformed input always yields an `Err`, never a panic.

use crate::thought::{Thought, THOUGHT_SCHEMA_VERSION};
use crate::timing::MusicalTime;
use serde_json::Value;
use thiserror::Error;

const REQUIRED_FIELDS: [&str; 5] = ["node_id", "status", "style_profile", "meta", "sequence"];

/// Structural schema violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Validate a candidate Thought
///
/// Order of checks:
/// 1. candidate is an object
/// 2. `schema_version` is `thought.v0`
/// 3. `node_id`, `status`, `style_profile`, `meta`, `sequence` are present
/// 4. `sequence` is an array
/// 5. every event passes [`validate_event`]
///
/// A candidate that passes is then decoded; `meta.loop_bars` must be a
/// positive integer and the remaining fields must have their declared types.
/// `status` and note `duration` accept any JSON value.
pub fn validate(candidate: &Value) -> Result<Thought, ValidationError> {
    let object = candidate
        .as_object()
        .ok_or_else(|| ValidationError::new("Thought is not an object"))?;

    if object.get("schema_version").and_then(Value::as_str) != Some(THOUGHT_SCHEMA_VERSION) {
        return Err(ValidationError::new("Unsupported schema version"));
    }

    for key in REQUIRED_FIELDS {
        if !object.contains_key(key) {
            return Err(ValidationError::new(format!(
                "Missing required field: {}",
                key
            )));
        }
    }

    let sequence = object["sequence"]
        .as_array()
        .ok_or_else(|| ValidationError::new("Sequence must be an array"))?;

    for event in sequence {
        validate_event(event)?;
    }

    let loop_bars = object["meta"].get("loop_bars").and_then(Value::as_u64);
    if !matches!(loop_bars, Some(bars) if bars > 0 && bars <= u32::MAX as u64) {
        return Err(ValidationError::new(
            "meta.loop_bars must be a positive integer",
        ));
    }

    serde_json::from_value(candidate.clone())
        .map_err(|e| ValidationError::new(format!("Invalid thought: {}", e)))
}

/// Validate a single sequence event
pub fn validate_event(event: &Value) -> Result<(), ValidationError> {
    let object = event
        .as_object()
        .ok_or_else(|| ValidationError::new("Event must be an object"))?;

    let time_ok = object
        .get("time")
        .and_then(Value::as_str)
        .is_some_and(|t| t.parse::<MusicalTime>().is_ok());
    if !time_ok {
        return Err(ValidationError::new(
            "Event time must match bar:beat:sixteenth",
        ));
    }

    let event_type = match object.get("type") {
        None | Some(Value::Null) => return Err(ValidationError::new("Event type is required")),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(ValidationError::new("Event type is required"))
        }
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(ValidationError::new(format!(
                "Unknown event type: {}",
                other
            )))
        }
    };

    if object.get("velocity").map_or(true, Value::is_null) {
        return Err(ValidationError::new("Event velocity is required"));
    }

    let is_number = |key: &str| object.get(key).is_some_and(Value::is_number);

    match event_type {
        "note" => {
            if !is_number("midi") {
                return Err(ValidationError::new("Note event requires midi"));
            }
            Ok(())
        }
        "mute" => Ok(()),
        "cc" => {
            if !is_number("cc") || !is_number("value") {
                return Err(ValidationError::new("CC event requires cc and value"));
            }
            Ok(())
        }
        other => Err(ValidationError::new(format!(
            "Unknown event type: {}",
            other
        ))),
    }
}
