//! Foundation model gateway
//!
//! This module provides:
//! - FoundationModel trait with the text-only fallback for image rejections
//! - Transport trait and the reqwest-backed HttpTransport
//! - OpenAI-compatible (Qwen3-VL), Gemini and offline mock providers
//! - select_model, mapping a model name to a provider

pub mod client;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use log::info;

pub use client::{FoundationModel, HttpResponse, HttpTransport, ProviderError, Transport};
pub use gemini::{Gemini, GeminiConfig, GeminiVariant};
pub use mock::MockModel;
pub use openai::{OpenAiCompatible, OpenAiConfig, normalize_endpoint};
pub use types::{EncodedImage, GenerateRequest};

use crate::config::ModelsConfig;
use crate::error::Result;

/// Provider a model name resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelKind {
    OpenAiCompatible { size: String },
    Gemini(GeminiVariant),
    Mock,
}

impl ModelKind {
    /// Map a user-facing model name to a provider; unknown names map to the mock
    pub fn from_name(name: &str, default_size: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("qwen") {
            let size = if has_size_token(&lower, "30") {
                "30B".to_string()
            } else if has_size_token(&lower, "8") {
                "8B".to_string()
            } else {
                default_size.to_uppercase()
            };
            ModelKind::OpenAiCompatible { size }
        } else if lower.contains("gemini") {
            ModelKind::Gemini(GeminiVariant::from_name(&lower))
        } else {
            ModelKind::Mock
        }
    }
}

/// True when some alphanumeric run of `name` is `billions` or `{billions}b`
fn has_size_token(name: &str, billions: &str) -> bool {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|part| part.strip_suffix('b').unwrap_or(part) == billions)
}

/// Build the provider for `name`
///
/// Fails only on configuration problems (missing Gemini key, HTTP client
/// construction).
pub fn select_model(name: &str, models: &ModelsConfig) -> Result<Arc<dyn FoundationModel>> {
    let kind = ModelKind::from_name(name, &models.qwen.default_size);
    info!("select_model: {} -> {:?}", name, kind);

    let model: Arc<dyn FoundationModel> = match kind {
        ModelKind::OpenAiCompatible { size } => {
            let transport = Arc::new(HttpTransport::new(models.qwen.timeout())?);
            Arc::new(OpenAiCompatible::new(&models.qwen, &size, transport))
        }
        ModelKind::Gemini(variant) => {
            let transport = Arc::new(HttpTransport::new(models.gemini.timeout())?);
            Arc::new(Gemini::new(&models.gemini, variant, transport)?)
        }
        ModelKind::Mock => Arc::new(MockModel::new()),
    };
    Ok(model)
}
