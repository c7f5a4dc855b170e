//! Skill library: atomic actions over the host and the model gateway

use std::sync::Arc;

use log::{debug, info, warn};

use super::SkillError;
use super::framing::{CameraPose, SceneBounds, compute_pose};
use super::scripts;
use crate::artifact::extract_code;
use crate::host::{ExecutionResult, HostError, Observation, SceneHost, run_script};
use crate::llm::{FoundationModel, ProviderError};

const PLANNER_SYSTEM: &str = "You are a 3D planning agent.";
const CAMERA_SYSTEM: &str = "You are a Blender Python expert. Output only valid Python code.";

/// How an `investigate` instruction was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Investigation {
    /// Matched a built-in phrase
    QuickCommand(&'static str),
    /// Model-generated code was executed
    Generated(String),
    /// Model output did not look like host code; nothing ran
    Skipped,
}

/// Skills shared by the generator and verifier
#[derive(Clone)]
pub struct SkillLibrary {
    host: Arc<dyn SceneHost>,
    model: Arc<dyn FoundationModel>,
}

impl SkillLibrary {
    pub fn new(host: Arc<dyn SceneHost>, model: Arc<dyn FoundationModel>) -> Self {
        Self { host, model }
    }

    pub fn host(&self) -> &Arc<dyn SceneHost> {
        &self.host
    }

    pub fn model(&self) -> &Arc<dyn FoundationModel> {
        &self.model
    }

    /// Write a high-level plan for the next edit
    pub async fn make_plan(&self, task: &str, context: &str) -> Result<String, ProviderError> {
        let prompt = format!(
            "Task: {}\nContext: {}\nCreate a step-by-step plan for the next iteration of Blender editing.",
            task, context
        );
        self.model.generate(PLANNER_SYSTEM, &prompt, &[]).await
    }

    /// Run code in the host
    pub async fn execute_code(&self, code: &str) -> ExecutionResult {
        self.host.execute(code).await
    }

    /// Scene summary as pretty JSON
    pub async fn scene_info_text(&self) -> Result<String, HostError> {
        let summary = self.host.state_summary().await?;
        serde_json::to_string_pretty(&summary).map_err(|e| HostError::Protocol(e.to_string()))
    }

    pub async fn capture_observation(&self, max_size: u32) -> Result<Observation, HostError> {
        self.host.capture_observation(max_size).await
    }

    /// Frame every mesh with the active camera
    ///
    /// Returns the applied pose, or `None` when the scene has no meshes or no
    /// camera; the viewpoint is left untouched in that case.
    pub async fn initialize_viewpoint(&self) -> Result<Option<CameraPose>, SkillError> {
        let output = run_script(self.host.as_ref(), &scripts::scene_bounds()).await?;
        let bounds: SceneBounds = serde_json::from_value(serde_json::Value::Object(output))
            .map_err(|e| HostError::Protocol(format!("bad bounds payload: {}", e)))?;

        match compute_pose(&bounds) {
            Some(pose) => {
                self.set_camera(&pose).await?;
                info!("Viewpoint framed {} object(s)", bounds.objects.len());
                Ok(Some(pose))
            }
            None => {
                info!(
                    "Viewpoint unchanged (objects={}, camera={})",
                    bounds.objects.len(),
                    bounds.camera.is_some()
                );
                Ok(None)
            }
        }
    }

    pub async fn set_camera(&self, pose: &CameraPose) -> Result<(), HostError> {
        run_script(self.host.as_ref(), &scripts::set_camera(pose)).await?;
        Ok(())
    }

    /// Adjust the camera from a natural-language instruction
    pub async fn investigate(&self, instruction: &str) -> Result<Investigation, SkillError> {
        if let Some((phrase, code)) = scripts::quick_command(instruction) {
            debug!("investigate: quick command '{}'", phrase);
            self.execute_checked(&code).await?;
            return Ok(Investigation::QuickCommand(phrase));
        }

        let prompt = format!(
            r#"Generate Blender Python code to adjust the camera based on this instruction:
"{}"

Return ONLY the Python code, no explanation. The code should:
1. Import bpy
2. Access bpy.context.scene.camera
3. Modify location and/or rotation_euler as needed

Example output:
```python
import bpy
cam = bpy.context.scene.camera
cam.location[0] += 5.0
```"#,
            instruction
        );

        let response = self.model.generate(CAMERA_SYSTEM, &prompt, &[]).await?;
        let code = extract_code(&response);
        if code.is_empty() || !code.contains("bpy") {
            warn!("investigate: model output is not host code, skipping");
            return Ok(Investigation::Skipped);
        }

        self.execute_checked(&code).await?;
        Ok(Investigation::Generated(code))
    }

    pub async fn set_visibility(&self, object_name: &str, visible: bool) -> Result<(), HostError> {
        run_script(self.host.as_ref(), &scripts::set_visibility(object_name, visible)).await?;
        Ok(())
    }

    async fn execute_checked(&self, code: &str) -> Result<(), HostError> {
        let result = self.host.execute(code).await;
        if result.is_success() {
            Ok(())
        } else {
            Err(HostError::Failed(result.error_summary()))
        }
    }
}

impl std::fmt::Debug for SkillLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillLibrary").field("model", &self.model.name()).finish()
    }
}
