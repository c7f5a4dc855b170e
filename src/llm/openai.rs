//! OpenAI-compatible chat completions provider
//!
//! Talks to any server exposing `/v1/chat/completions` (Qwen3-VL on vLLM,
//! llama.cpp, LM Studio). Images follow the text as `image_url` parts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::client::{FoundationModel, ProviderError, Transport};
use super::types::GenerateRequest;
use crate::error::{Result, SceneloopError};

/// Default local endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/v1";

/// Default Qwen3-VL size when the model name does not say
pub const DEFAULT_SIZE: &str = "30B";

/// Statuses meaning the server has no `/models` listing
const MODELS_UNSUPPORTED: [u16; 2] = [404, 405];

/// Configuration for OpenAI-compatible servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: String,

    /// Served model id; derived from the size when unset
    pub model: Option<String>,

    pub default_size: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: None,
            default_size: DEFAULT_SIZE.to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            timeout_secs: 300,
        }
    }
}

impl OpenAiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model id sent in requests for the given size
    pub fn served_model(&self, size: &str) -> String {
        match &self.model {
            Some(model) if !model.is_empty() => model.clone(),
            _ => format!("Qwen/Qwen3-VL-{}-Instruct", size.to_uppercase()),
        }
    }
}

/// Normalize a base endpoint so it ends in `/v1`
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

/// Model ids from a `/models` payload (`data` or `models` array)
pub fn model_ids(payload: &Value) -> Vec<String> {
    payload
        .get("data")
        .or_else(|| payload.get("models"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// OpenAI-compatible provider
pub struct OpenAiCompatible {
    transport: Arc<dyn Transport>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatible {
    pub fn new(config: &OpenAiConfig, size: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoint: normalize_endpoint(&config.endpoint),
            model: config.served_model(size),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the chat completions body
    fn build_request(&self, request: &GenerateRequest) -> Value {
        let user_content = if request.has_images() {
            let mut parts = vec![json!({"type": "text", "text": request.user})];
            parts.extend(request.payload_images().map(|img| {
                json!({
                    "type": "image_url",
                    "image_url": {"url": img.to_data_uri()}
                })
            }));
            Value::Array(parts)
        } else {
            json!(request.user)
        };

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": user_content}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        })
    }

    fn parse_response(body: &Value) -> std::result::Result<String, ProviderError> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ProviderError::malformed("missing choices[0].message.content"))
    }

    /// Models the server reports; `None` when the server has no listing
    pub async fn available_models(&self) -> std::result::Result<Option<Vec<String>>, ProviderError> {
        let url = format!("{}/models", self.endpoint);
        let response = self.transport.get(&url).await?;
        if MODELS_UNSUPPORTED.contains(&response.status) {
            return Ok(None);
        }
        let payload = response.into_json()?;
        Ok(Some(model_ids(&payload)))
    }

    /// Fail with a configuration error when the served model is missing
    pub async fn ensure_model_loaded(&self) -> Result<()> {
        match self.available_models().await? {
            None => {
                info!("{}: /models not supported, skipping availability check", self.endpoint);
                Ok(())
            }
            Some(models) if models.iter().any(|m| m == &self.model) => {
                info!("{}: model {} is loaded", self.endpoint, self.model);
                Ok(())
            }
            Some(models) => {
                warn!("{}: model {} not in {:?}", self.endpoint, self.model, models);
                Err(SceneloopError::Config(format!(
                    "model '{}' is not served by {} (available: {})",
                    self.model,
                    self.endpoint,
                    if models.is_empty() { "none".to_string() } else { models.join(", ") }
                )))
            }
        }
    }
}

#[async_trait]
impl FoundationModel for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, request: &GenerateRequest) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = self.build_request(request);
        let response = self.transport.post_json(&url, &[], &body).await?;
        Self::parse_response(&response.into_json()?)
    }

    async fn check_available(&self) -> Result<()> {
        self.ensure_model_loaded().await
    }
}

impl std::fmt::Debug for OpenAiCompatible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatible")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::RecordingTransport;
    use crate::llm::types::EncodedImage;

    const OK_BODY: &str = r#"{"choices": [{"message": {"role": "assistant", "content": "done"}}]}"#;

    fn client(transport: Arc<RecordingTransport>) -> OpenAiCompatible {
        OpenAiCompatible::new(&OpenAiConfig::default(), "30b", transport)
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("http://localhost:8000"), "http://localhost:8000/v1");
        assert_eq!(normalize_endpoint("http://localhost:8000/"), "http://localhost:8000/v1");
        assert_eq!(normalize_endpoint("http://localhost:8000/v1"), "http://localhost:8000/v1");
        assert_eq!(normalize_endpoint("http://localhost:8000/v1/"), "http://localhost:8000/v1");
    }

    #[test]
    fn test_served_model() {
        let config = OpenAiConfig::default();
        assert_eq!(config.served_model("8b"), "Qwen/Qwen3-VL-8B-Instruct");

        let config = OpenAiConfig {
            model: Some("local-qwen".to_string()),
            ..Default::default()
        };
        assert_eq!(config.served_model("8b"), "local-qwen");
    }

    #[test]
    fn test_model_ids() {
        let payload = json!({"data": [{"id": "a"}, {"id": "b"}, {"object": "model"}]});
        assert_eq!(model_ids(&payload), vec!["a", "b"]);
        assert_eq!(model_ids(&json!({"models": [{"id": "c"}]})), vec!["c"]);
        assert!(model_ids(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_text_only_request_shape() {
        let transport = Arc::new(RecordingTransport::new().respond(200, OK_BODY));
        let model = client(transport.clone());

        let text = model.generate("system", "make a cube", &[]).await.unwrap();
        assert_eq!(text, "done");

        let (url, body) = transport.post(0);
        assert_eq!(url, "http://localhost:8000/v1/chat/completions");
        assert_eq!(body["model"], "Qwen/Qwen3-VL-30B-Instruct");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "make a cube");
        assert_eq!(body["max_tokens"], 2048);
    }

    #[tokio::test]
    async fn test_images_follow_text() {
        let transport = Arc::new(RecordingTransport::new().respond(200, OK_BODY));
        let model = client(transport.clone());

        let images = vec![EncodedImage::new("AAAA"), EncodedImage::new(""), EncodedImage::new("BBBB")];
        model.generate("system", "describe", &images).await.unwrap();

        let (_, body) = transport.post(0);
        let parts = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(parts[2]["image_url"]["url"], "data:image/png;base64,BBBB");
    }

    #[tokio::test]
    async fn test_multimodal_fallback_over_transport() {
        let transport = Arc::new(
            RecordingTransport::new()
                .respond(400, "image input not supported")
                .respond(200, OK_BODY),
        );
        let model = client(transport.clone());

        let text = model.generate("system", "describe", &[EncodedImage::new("AAAA")]).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(transport.post_count(), 2);

        let (_, retry) = transport.post(1);
        assert_eq!(retry["messages"][1]["content"], "describe");
    }

    #[tokio::test]
    async fn test_multimodal_fallback_second_failure() {
        let transport = Arc::new(RecordingTransport::new().respond(400, "first").respond(400, "second"));
        let model = client(transport.clone());

        let err = model.generate("system", "describe", &[EncodedImage::new("AAAA")]).await.unwrap_err();
        assert_eq!(err, ProviderError::http(400, "second"));
        assert_eq!(transport.post_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let transport = Arc::new(RecordingTransport::new().respond(200, r#"{"choices": []}"#));
        let model = client(transport);
        let err = model.generate("s", "u", &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_ensure_model_loaded() {
        let listing = r#"{"data": [{"id": "Qwen/Qwen3-VL-30B-Instruct"}]}"#;
        let transport = Arc::new(RecordingTransport::new().respond(200, listing));
        client(transport.clone()).ensure_model_loaded().await.unwrap();
        assert_eq!(transport.gets.lock().unwrap()[0], "http://localhost:8000/v1/models");

        let transport = Arc::new(RecordingTransport::new().respond(200, r#"{"data": [{"id": "other"}]}"#));
        let err = client(transport).ensure_model_loaded().await.unwrap_err();
        assert!(matches!(err, SceneloopError::Config(_)));
        assert!(err.to_string().contains("other"));
    }

    #[tokio::test]
    async fn test_models_listing_unsupported_is_skipped() {
        for status in [404, 405] {
            let transport = Arc::new(RecordingTransport::new().respond(status, "not found"));
            let model = client(transport);
            assert_eq!(model.available_models().await.unwrap(), None);
            model.check_available().await.unwrap();
        }
    }
}
