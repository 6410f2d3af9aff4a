//! Client for the remote generation/resolution service
//!
//! Every failure, whether declared by the backend, caused by an unreadable
//! body or by the network, is normalized into a [`TransportError`] carrying
//! an [`ErrorEnvelope`].

use async_trait::async_trait;
use mind_common::api::{
    declares_error, ErrorEnvelope, GenerateRequest, Profile, ProfilesResponse, ResolveRequest,
    ResolveResponse, BACKEND_ERROR_MESSAGE,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("mind-rt/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error code for connection-level failures
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// Normalized service failure
#[derive(Debug, Clone, Error)]
#[error("{envelope}")]
pub struct TransportError {
    envelope: ErrorEnvelope,
}

impl TransportError {
    pub fn new(envelope: ErrorEnvelope) -> Self {
        Self { envelope }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorEnvelope::new(NETWORK_ERROR, message, None))
    }

    pub fn invalid_json() -> Self {
        Self::new(ErrorEnvelope::invalid_json())
    }

    pub fn envelope(&self) -> &ErrorEnvelope {
        &self.envelope
    }

    pub fn code(&self) -> &str {
        self.envelope.code()
    }

    /// Message for node status, `"Backend error"` when the envelope has none
    pub fn status_message(&self) -> &str {
        match self.envelope.message() {
            "" => BACKEND_ERROR_MESSAGE,
            message => message,
        }
    }
}

impl From<ErrorEnvelope> for TransportError {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::new(envelope)
    }
}

/// Remote Thought generation and conflict resolution
#[async_trait]
pub trait ThoughtService: Send + Sync {
    async fn profiles(&self) -> Result<Vec<Profile>, TransportError>;

    /// Generate a Thought; the body is returned unvalidated
    async fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError>;

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, TransportError>;
}

/// [`ThoughtService`] over HTTP
pub struct HttpThoughtService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpThoughtService {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_body(response).await
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::network(e.to_string()))?;
    interpret_body(status.is_success(), &text)
}

/// Apply the failure rules to a raw response body
///
/// Unparsable bodies fail as `INTERNAL_ERROR` whatever the status; parsed
/// bodies fail when the status is not a success or `error` is truthy.
pub fn interpret_body(success: bool, text: &str) -> Result<Value, TransportError> {
    let body: Value = serde_json::from_str(text).map_err(|_| TransportError::invalid_json())?;
    if !success || declares_error(&body) {
        return Err(ErrorEnvelope::from_body(&body).into());
    }
    Ok(body)
}

#[async_trait]
impl ThoughtService for HttpThoughtService {
    async fn profiles(&self) -> Result<Vec<Profile>, TransportError> {
        let body = self.get_json("/profiles").await?;
        let response: ProfilesResponse =
            serde_json::from_value(body).map_err(|_| TransportError::invalid_json())?;
        Ok(response.profiles)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError> {
        self.post_json("/generate", request).await
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, TransportError> {
        let body = self.post_json("/resolve-conflict", request).await?;
        serde_json::from_value(body).map_err(|_| TransportError::invalid_json())
    }
}
