//! HTTP transport to the onboarding service.
use async_trait::async_trait;
use onboarder_core::request::Method;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// An error relating to the transport, raised when no response was received.
#[derive(Error, Debug)]
pub enum HttpClientError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("Failed to read response body from {url}: {reason}")]
    FailedToReadBody { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub fn is_success(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode(status),
            body: body.into(),
        }
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Sends one request to the service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, HttpClientError>;
}

/// `reqwest` backed client.
#[derive(Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, HttpClientError> {
        let mut builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| HttpClientError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        let status = StatusCode(response.status().as_u16());
        match response.bytes().await {
            Ok(body) => Ok(Response {
                status,
                body: body.to_vec(),
            }),
            Err(err) => unread_body(status, url, err.to_string()),
        }
    }
}

// A failure status is still reported when its body cannot be read.
fn unread_body(status: StatusCode, url: &str, reason: String) -> Result<Response, HttpClientError> {
    if status.is_success() {
        return Err(HttpClientError::FailedToReadBody {
            url: url.to_string(),
            reason,
        });
    }
    Ok(Response {
        status,
        body: Vec::new(),
    })
}
