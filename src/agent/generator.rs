//! Generator agent: plan, then synthesize the next program

use std::sync::Arc;

use log::{debug, info};

use crate::artifact::extract_code;
use crate::llm::{FoundationModel, ProviderError};
use crate::memory::{ContextMemory, IterationRecord};
use crate::skills::SkillLibrary;

const GENERATOR_SYSTEM: &str = "You are an expert Blender Python scripter. Generate robust code.";

/// Produces the plan and code artifact for one iteration; never touches the host
pub struct GeneratorAgent {
    skills: SkillLibrary,
    model: Arc<dyn FoundationModel>,
}

impl GeneratorAgent {
    pub fn new(skills: SkillLibrary, model: Arc<dyn FoundationModel>) -> Self {
        Self { skills, model }
    }

    /// Build the synthesis prompt
    pub fn build_prompt(task: &str, plan: &str, history: &str, latest_code: &str) -> String {
        format!(
            "Task: {}\nCurrent Plan: {}\nContext History:\n{}\n\nLatest Code:\n```python\n{}\n```\n\n\
             Generate the next version of the code. Output full executable python code.",
            task, plan, history, latest_code
        )
    }

    /// Plan and synthesize; the returned record carries `plan` and `code_artifact`
    pub async fn generate_step(
        &self,
        task: &str,
        memory: &ContextMemory,
        iteration: u32,
    ) -> Result<IterationRecord, ProviderError> {
        let history = memory.render_prompt_block();

        let plan = self.skills.make_plan(task, &history).await?;
        debug!("Generator plan for iteration {}: {} chars", iteration, plan.len());

        let prompt = Self::build_prompt(task, &plan, &history, memory.latest_code());
        let response = self.model.generate(GENERATOR_SYSTEM, &prompt, &[]).await?;
        let code = extract_code(&response);
        info!("Generator produced {} bytes of code for iteration {}", code.len(), iteration);

        Ok(IterationRecord::new(iteration).with_plan(plan).with_code(code))
    }
}
