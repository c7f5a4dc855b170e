//! Core gateway trait, provider errors and the HTTP transport seam

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;

use super::types::{EncodedImage, GenerateRequest};
use crate::error::Result;

/// HTTP status a provider returns when it rejects the multimodal request shape
pub const MULTIMODAL_REJECTION_STATUS: u16 = 400;

/// Errors that can occur while talking to a model provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        ProviderError::Http {
            status,
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ProviderError::Transport(message.into())
    }

    pub fn timeout(after: Duration) -> Self {
        ProviderError::Timeout(after)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed(message.into())
    }

    /// HTTP status, when the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body or failure description
    pub fn body(&self) -> String {
        match self {
            ProviderError::Http { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }

    /// True when the provider signalled it cannot accept image inputs
    pub fn is_multimodal_rejection(&self) -> bool {
        self.status() == Some(MULTIMODAL_REJECTION_STATUS)
    }
}

/// Raw response from a transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse a 2xx body as JSON; any other status becomes `ProviderError::Http`
    pub fn into_json(self) -> std::result::Result<Value, ProviderError> {
        if !self.is_success() {
            return Err(ProviderError::http(self.status, self.body));
        }
        serde_json::from_str(&self.body).map_err(|e| ProviderError::malformed(format!("body is not JSON: {}", e)))
    }
}

/// HTTP seam between providers and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body; credentials travel in `headers`, never in `url`
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, ProviderError>;

    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, ProviderError>;
}

/// reqwest-backed transport; one client per provider for the whole run
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> std::result::Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// The request URL is stripped from the message before it is kept
    fn map_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::timeout(self.timeout)
        } else {
            ProviderError::transport(err.without_url().to_string())
        }
    }

    async fn read(&self, response: reqwest::Response) -> std::result::Result<HttpResponse, ProviderError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, ProviderError> {
        let mut builder = self.client.post(url).json(body);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        self.read(response).await
    }

    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|e| self.map_error(e))?;
        self.read(response).await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").field("timeout", &self.timeout).finish()
    }
}

/// Uniform text generation over heterogeneous model providers
///
/// Providers implement `attempt`, a single request. Callers use `generate`,
/// which adds the text-only fallback for providers that reject images.
#[async_trait]
pub trait FoundationModel: Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// One provider request, no retries
    async fn attempt(&self, request: &GenerateRequest) -> std::result::Result<String, ProviderError>;

    /// Startup availability check; providers without one always pass
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Generate text, retrying once without images on a multimodal rejection
    async fn generate(
        &self,
        system: &str,
        user: &str,
        images: &[EncodedImage],
    ) -> std::result::Result<String, ProviderError> {
        let request = GenerateRequest::new(system, user).with_images(images.to_vec());
        debug!(
            "{}: generate system={} user={} images={}",
            self.name(),
            system.len(),
            user.len(),
            images.len()
        );

        match self.attempt(&request).await {
            Err(err) if err.is_multimodal_rejection() && request.has_images() => {
                warn!("{}: images rejected ({}), retrying text-only", self.name(), err);
                self.attempt(&request.text_only()).await
            }
            other => other,
        }
    }
}
