//! Error type and conversions.
use crate::http_client::{HttpClientError, StatusCode};
use onboarder_core::{
    claims::ClaimsError, config::ConfigError, jwk::JwkError, key_manager::KeyManagerError,
    store::StoreError,
};
use serde_json::Value;
use thiserror::Error;

/// Onboarder API error type.
#[derive(Error, Debug)]
pub enum OnboarderAPIError {
    /// Local input is missing; raised before any request is sent.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Claims error: {0}")]
    Claims(ClaimsError),
    #[error("Key error: {0}")]
    Jwk(JwkError),
    #[error("Key manager error: {0}")]
    KeyManager(KeyManagerError),
    #[error("Document store error: {0}")]
    Store(StoreError),
    #[error("Configuration error: {0}")]
    Config(ConfigError),
    /// The service answered with a non-success status.
    #[error("Service responded with status {status}.")]
    RemoteFailure { status: StatusCode, body: String },
    /// No response was received.
    #[error("Transport error: {0}")]
    Transport(HttpClientError),
    /// The service call succeeded but its result could not be saved.
    #[error("Request succeeded but saving the result failed: {source}")]
    PersistFailed {
        response: Value,
        source: Box<OnboarderAPIError>,
    },
    /// A success response without the artifact requested for saving.
    #[error("Response has no {artifact} to save.")]
    MissingArtifact {
        artifact: &'static str,
        response: Value,
    },
    #[error("JSON Serialization Error: {0}.")]
    FailedToSerialize(serde_json::Error),
}

impl OnboarderAPIError {
    /// Service output carried by the error, for display.
    pub fn response_body(&self) -> Option<String> {
        match self {
            OnboarderAPIError::RemoteFailure { body, .. } => Some(body.clone()),
            OnboarderAPIError::PersistFailed { response, .. }
            | OnboarderAPIError::MissingArtifact { response, .. } => {
                serde_json::to_string_pretty(response).ok()
            }
            _ => None,
        }
    }
}

impl From<ClaimsError> for OnboarderAPIError {
    fn from(err: ClaimsError) -> Self {
        OnboarderAPIError::Claims(err)
    }
}

impl From<JwkError> for OnboarderAPIError {
    fn from(err: JwkError) -> Self {
        OnboarderAPIError::Jwk(err)
    }
}

impl From<KeyManagerError> for OnboarderAPIError {
    fn from(err: KeyManagerError) -> Self {
        OnboarderAPIError::KeyManager(err)
    }
}

impl From<StoreError> for OnboarderAPIError {
    fn from(err: StoreError) -> Self {
        OnboarderAPIError::Store(err)
    }
}

impl From<ConfigError> for OnboarderAPIError {
    fn from(err: ConfigError) -> Self {
        OnboarderAPIError::Config(err)
    }
}

impl From<HttpClientError> for OnboarderAPIError {
    fn from(err: HttpClientError) -> Self {
        OnboarderAPIError::Transport(err)
    }
}
