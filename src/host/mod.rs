//! Modeling host client
//!
//! This module provides:
//! - SceneHost trait, the only surface the rest of the crate sees
//! - Wire types (ExecutionResult, Observation) and HostError
//! - SocketHost, newline-delimited JSON over TCP
//! - Python scripts used to query and reset the scene
//!
//! Transports implement `execute`; observation, scene summary and clearing
//! are scripts run through it whose stdout carries one JSON object.

pub mod scripts;
pub mod socket;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use socket::{HostConfig, SocketHost};
pub use types::{ExecutionResult, HostError, HostStatus, Observation};

use crate::artifact::extract_structured_object;

/// External modeling host
#[async_trait]
pub trait SceneHost: Send + Sync {
    /// Run code in the host; transport failures come back as error results
    async fn execute(&self, code: &str) -> ExecutionResult;

    /// Capture the current viewpoint
    async fn capture_observation(&self, max_size: u32) -> Result<Observation, HostError> {
        let value = run_script(self, &scripts::capture_viewport(max_size)).await?;
        let observation: Observation =
            serde_json::from_value(Value::Object(value)).map_err(|e| HostError::Protocol(e.to_string()))?;
        if observation.image().is_none() {
            let reason = observation.message.unwrap_or_else(|| "capture returned no image".to_string());
            return Err(HostError::Failed(reason));
        }
        Ok(observation)
    }

    /// Structured summary of scene content
    async fn state_summary(&self) -> Result<Value, HostError> {
        let mut value = run_script(self, &scripts::scene_info()).await?;
        Ok(value.remove("scene_info").unwrap_or(Value::Object(value)))
    }

    /// Remove scene objects
    async fn clear(&self, keep_camera: bool) -> ExecutionResult {
        let result = self.execute(&scripts::clear_scene(keep_camera)).await;
        if !result.is_success() {
            return result;
        }
        match parse_script_output(&result) {
            Ok(_) => result,
            Err(err) => ExecutionResult::error(err.to_string()),
        }
    }
}

/// Execute a script and parse the JSON object it printed
pub async fn run_script<H: SceneHost + ?Sized>(
    host: &H,
    script: &str,
) -> Result<serde_json::Map<String, Value>, HostError> {
    let result = host.execute(script).await;
    parse_script_output(&result)
}

/// JSON object printed by a script; `"status": "error"` becomes `HostError::Failed`
pub fn parse_script_output(result: &ExecutionResult) -> Result<serde_json::Map<String, Value>, HostError> {
    if !result.is_success() {
        return Err(HostError::Failed(result.error_summary()));
    }
    let value = extract_structured_object(&result.output).map_err(|e| HostError::Protocol(e.to_string()))?;
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("script reported an error")
            .to_string();
        return Err(HostError::Failed(message));
    }
    Ok(value)
}
