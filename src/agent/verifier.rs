//! Verifier agent: observe the scene and judge it against the task

use std::sync::Arc;

use log::{info, warn};

use crate::llm::{EncodedImage, FoundationModel, ProviderError};
use crate::memory::{Feedback, IterationRecord};
use crate::skills::SkillLibrary;

/// Default sentinel the verifier emits when the task is satisfied
pub const DEFAULT_SENTINEL: &str = "OBJECTIVE COMPLETE";

/// Default longest edge of captured observations
pub const DEFAULT_CAPTURE_SIZE: u32 = 1024;

const VERIFIER_SYSTEM: &str = "You are a Vision-as-Inverse-Graphics Verifier.";

/// Inspects the scene after execution; never edits scene content
pub struct VerifierAgent {
    skills: SkillLibrary,
    model: Arc<dyn FoundationModel>,
    sentinel: String,
    capture_size: u32,
}

impl VerifierAgent {
    pub fn new(skills: SkillLibrary, model: Arc<dyn FoundationModel>) -> Self {
        Self {
            skills,
            model,
            sentinel: DEFAULT_SENTINEL.to_string(),
            capture_size: DEFAULT_CAPTURE_SIZE,
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_capture_size(mut self, capture_size: u32) -> Self {
        self.capture_size = capture_size;
        self
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    fn build_prompt(&self, task: &str, scene_info: &str) -> String {
        format!(
            "Task: {}\nScene Info: {}\nVerify if the rendered image matches the task.\n\
             Provide specific feedback on geometry, placement, and materials.\n\
             Suggest specific fixes.\n\
             If the scene fully satisfies the task, include the phrase {} in your reply.",
            task, scene_info, self.sentinel
        )
    }

    /// Frame, summarize, capture, then ask the model for a judgment
    ///
    /// Framing, summary and capture failures are logged and the judgment
    /// proceeds with what is available. Only the model call can fail.
    pub async fn verify_step(&self, task: &str, record: &IterationRecord) -> Result<Feedback, ProviderError> {
        if let Err(err) = self.skills.initialize_viewpoint().await {
            warn!("Iteration {}: viewpoint framing failed: {}", record.sequence_number, err);
        }

        let scene_info = match self.skills.scene_info_text().await {
            Ok(text) => text,
            Err(err) => {
                warn!("Iteration {}: scene summary unavailable: {}", record.sequence_number, err);
                format!("unavailable ({})", err)
            }
        };

        let images: Vec<EncodedImage> = match self.skills.capture_observation(self.capture_size).await {
            Ok(observation) => observation.image().into_iter().collect(),
            Err(err) => {
                warn!("Iteration {}: observation capture failed: {}", record.sequence_number, err);
                Vec::new()
            }
        };

        info!(
            "Verifier judging iteration {} with {} image(s)",
            record.sequence_number,
            images.len()
        );
        let prompt = self.build_prompt(task, &scene_info);
        let text = self.model.generate(VERIFIER_SYSTEM, &prompt, &images).await?;
        Ok(Feedback::Visual(text))
    }
}
