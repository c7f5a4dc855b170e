//! Host wire types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm::EncodedImage;

/// Errors talking to the modeling host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Connection to {addr} failed: {message}")]
    Connect { addr: String, message: String },

    #[error("Host I/O error: {0}")]
    Io(String),

    #[error("Host request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Host protocol error: {0}")]
    Protocol(String),

    #[error("Host reported failure: {0}")]
    Failed(String),
}

/// Outcome status reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    Success,
    Error,
    #[serde(other)]
    Other,
}

/// Result of running code in the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: HostStatus,

    /// Captured stdout
    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: HostStatus::Success,
            output: output.into(),
            errors: Vec::new(),
            result: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HostStatus::Error,
            output: String::new(),
            errors: vec![message.into()],
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == HostStatus::Success
    }

    /// Errors joined for feedback; falls back to stdout when none were reported
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            if self.output.trim().is_empty() {
                "unknown error".to_string()
            } else {
                self.output.trim().to_string()
            }
        } else {
            self.errors.join("; ")
        }
    }

    /// Compact JSON form recorded in iteration history
    pub fn summary(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self.status))
    }
}

impl From<HostError> for ExecutionResult {
    fn from(err: HostError) -> Self {
        ExecutionResult::error(err.to_string())
    }
}

/// Captured image of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub status: HostStatus,

    #[serde(default)]
    pub image_data: String,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_format() -> String {
    "png".to_string()
}

impl Observation {
    pub fn new(image: EncodedImage, width: u32, height: u32) -> Self {
        Self {
            status: HostStatus::Success,
            image_data: image.as_str().to_string(),
            format: default_format(),
            width,
            height,
            message: None,
        }
    }

    /// Image payload, when the capture succeeded and is non-empty
    pub fn image(&self) -> Option<EncodedImage> {
        if self.status == HostStatus::Success && !self.image_data.is_empty() {
            Some(EncodedImage::new(self.image_data.clone()))
        } else {
            None
        }
    }
}
