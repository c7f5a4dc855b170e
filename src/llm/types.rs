//! Request types shared by all providers

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

const DATA_URI_PREFIX: &str = "base64,";

/// Base64-encoded image payload; opaque to the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Wrap an already-encoded payload, stripping any `data:...;base64,` prefix
    pub fn new(data: impl Into<String>) -> Self {
        let data = data.into();
        match data.find(DATA_URI_PREFIX) {
            Some(pos) if data.starts_with("data:") => Self(data[pos + DATA_URI_PREFIX.len()..].to_string()),
            _ => Self(data),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `data:` URI form for providers that take image URLs
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.0)
    }
}

/// One generation request: system prompt, user prompt, ordered images
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    pub system: String,
    pub user: String,
    pub images: Vec<EncodedImage>,
}

impl GenerateRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<EncodedImage>) -> Self {
        self.images = images;
        self
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Images that will actually be sent; empty payloads are skipped
    pub fn payload_images(&self) -> impl Iterator<Item = &EncodedImage> {
        self.images.iter().filter(|img| !img.is_empty())
    }

    /// Same prompts with no images
    pub fn text_only(&self) -> Self {
        Self {
            system: self.system.clone(),
            user: self.user.clone(),
            images: Vec::new(),
        }
    }
}
