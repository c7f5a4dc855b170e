//! Google Gemini provider (generativelanguage API)
//!
//! Images precede the text as `inline_data` parts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::client::{FoundationModel, ProviderError, Transport};
use super::types::GenerateRequest;
use crate::error::{Result, SceneloopError};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default API base
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiVariant {
    Pro,
    Flash,
    FlashLite,
}

impl GeminiVariant {
    /// Variant named in a model string; Pro when none is named
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("flash-lite") || lower.contains("flash_lite") || lower.contains("flashlite") {
            GeminiVariant::FlashLite
        } else if lower.contains("flash") {
            GeminiVariant::Flash
        } else {
            GeminiVariant::Pro
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeminiVariant::Pro => "pro",
            GeminiVariant::Flash => "flash",
            GeminiVariant::FlashLite => "flash-lite",
        }
    }

    pub fn model_name(&self) -> String {
        format!("gemini-3.0-{}", self.as_str())
    }
}

/// Configuration for the Gemini provider
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            temperature: 0.4,
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Gemini provider
pub struct Gemini {
    transport: Arc<dyn Transport>,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Gemini {
    /// Create a client; a missing API key is a configuration error
    pub fn new(config: &GeminiConfig, variant: GeminiVariant, transport: Arc<dyn Transport>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SceneloopError::Config(
                    "Gemini API key not configured. Set GOOGLE_AI_API_KEY or GEMINI_API_KEY".to_string(),
                )
            })?;

        Ok(Self {
            transport,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: variant.model_name(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, request: &GenerateRequest) -> Value {
        let mut parts: Vec<Value> = request
            .payload_images()
            .map(|img| {
                json!({
                    "inline_data": {"mime_type": "image/png", "data": img.as_str()}
                })
            })
            .collect();
        parts.push(json!({"text": request.user}));

        json!({
            "contents": [{"parts": parts}],
            "systemInstruction": {"parts": [{"text": request.system}]},
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens
            }
        })
    }

    fn parse_response(body: &Value) -> std::result::Result<String, ProviderError> {
        let candidate = body
            .pointer("/candidates/0")
            .ok_or_else(|| ProviderError::malformed("Gemini returned no candidates"))?;
        let part = candidate
            .pointer("/content/parts/0")
            .ok_or_else(|| ProviderError::malformed("Gemini returned no parts"))?;
        Ok(part.get("text").and_then(Value::as_str).unwrap_or_default().to_string())
    }
}

#[async_trait]
impl FoundationModel for Gemini {
    fn name(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, request: &GenerateRequest) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = self.build_request(request);
        let headers = [(API_KEY_HEADER, self.api_key.as_str())];
        let response = self.transport.post_json(&url, &headers, &body).await?;
        Self::parse_response(&response.into_json()?)
    }
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}
