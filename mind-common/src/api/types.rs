//! Request/response types for the generation service
//!
//! Endpoints:
//! - `GET /profiles` → [`ProfilesResponse`]
//! - `POST /generate` ([`GenerateRequest`]) → Thought JSON | [`ErrorEnvelope`]
//! - `POST /resolve-conflict` ([`ResolveRequest`]) → [`ResolveResponse`] | [`ErrorEnvelope`]

use crate::thought::Thought;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Schema version of conflict resolution requests
pub const RESOLVE_SCHEMA_VERSION: &str = "resolve.v0";

/// Error code used when the service response cannot be interpreted
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Message shown for failures that carry no message of their own
pub const BACKEND_ERROR_MESSAGE: &str = "Backend error";

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            params: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesResponse {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

// ============================================================================
// Generation
// ============================================================================

/// Musical context the generator needs besides the intent text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContext {
    pub tempo: f64,
    pub time_signature: String,
    pub anchor_midi: u8,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub schema_version: String,
    pub node_id: String,
    pub style_profile: String,
    pub intent_text: String,
    pub context: GenerateContext,
}

// ============================================================================
// Conflict resolution
// ============================================================================

/// Positional role of a resolution input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bass,
    Lead,
}

impl Role {
    /// First available input is the bass, every later one a lead
    pub fn for_position(index: usize) -> Self {
        if index == 0 {
            Role::Bass
        } else {
            Role::Lead
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveInput {
    pub node_id: String,
    pub role: Role,
    pub thought: Thought,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub schema_version: String,
    pub style_profile: String,
    pub inputs: Vec<ResolveInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedThought {
    #[serde(default)]
    pub node_id: Option<String>,
    /// Raw Thought, validated by the consumer before use
    pub thought: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub resolved: Vec<ResolvedThought>,
    /// Service diagnostics (clash counts, actions); not interpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default = "default_error_code")]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub span: Option<Value>,
}

fn default_error_code() -> String {
    INTERNAL_ERROR.to_string()
}

/// Uniform failure shape for backend-declared and transport-level errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            error: ErrorBody {
                error_code: error_code.into(),
                message: message.into(),
                hint: hint.map(str::to_string),
                span: None,
            },
        }
    }

    /// Synthetic envelope for a body that could not be parsed
    pub fn invalid_json() -> Self {
        Self::new(INTERNAL_ERROR, "Invalid JSON response", Some("Check backend logs"))
    }

    /// Interpret a parsed failure body
    ///
    /// Bodies with an `error` object are decoded leniently; anything else
    /// becomes a synthetic `INTERNAL_ERROR` with the generic failure message.
    pub fn from_body(body: &Value) -> Self {
        match body.get("error") {
            Some(error @ Value::Object(_)) => {
                serde_json::from_value::<ErrorBody>(error.clone())
                    .map(|error| Self { error })
                    .unwrap_or_else(|_| Self::backend_error())
            }
            Some(Value::String(message)) if !message.is_empty() => {
                Self::new(INTERNAL_ERROR, message.clone(), None)
            }
            _ => Self::backend_error(),
        }
    }

    fn backend_error() -> Self {
        Self::new(INTERNAL_ERROR, BACKEND_ERROR_MESSAGE, None)
    }

    pub fn code(&self) -> &str {
        &self.error.error_code
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.error_code, self.error.message)
    }
}

/// True when a response body declares an error (`error` present and truthy)
pub fn declares_error(body: &Value) -> bool {
    match body.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
