//! The five pipeline stages
//!
//! Every stage takes the workflow state by value and hands it back updated.
//! Stage failures are written into the state; none of them return errors.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::state::{CodeMetadata, HistoryEntry, MAX_PLANNED_ITERATIONS, Subtask, WorkflowState};
use crate::artifact::{extract_code, extract_structured_object};
use crate::evaluator::{QualityReport, VisionEvaluator};
use crate::host::{ExecutionResult, SceneHost};
use crate::llm::FoundationModel;

const PLANNER_SYSTEM: &str = "You are an expert 3D scene planner.";

/// Default system prompt for code-writing stages
pub const DESIGNER_SYSTEM: &str = "You are an expert Blender Python scripter. \
Write complete, executable bpy code, wrap it in a ```python fence and handle errors.";

/// Decomposes the intent into subtasks
pub struct Planner {
    model: Arc<dyn FoundationModel>,
}

impl Planner {
    pub fn new(model: Arc<dyn FoundationModel>) -> Self {
        Self { model }
    }

    fn build_prompt(intent: &str) -> String {
        format!(
            r#"You are a 3D scene planning expert. Break down the user's intent into concrete, executable subtasks for Blender.

User Intent: {intent}

Analyze the intent and create:
1. A list of subtasks (each should be a single Blender operation)
2. Dependency relationships between tasks

Output JSON format:
{{
    "subtasks": [
        {{"id": "task_1", "description": "Clean existing scene", "dependencies": []}},
        {{"id": "task_2", "description": "Set up camera at (7, -7, 5)", "dependencies": ["task_1"]}},
        {{"id": "task_3", "description": "Add main objects", "dependencies": ["task_1"]}}
    ],
    "complexity_estimate": "simple|moderate|complex",
    "estimated_iterations": 2
}}

Focus on:
- Clear, atomic tasks
- Proper ordering (dependencies)
- Realistic scope (achievable in Blender)
"#
        )
    }

    fn parse_subtasks(plan: &Map<String, Value>) -> Option<Vec<Subtask>> {
        let items = plan.get("subtasks")?.as_array()?;
        let subtasks: Vec<Subtask> = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let mut task: Subtask = serde_json::from_value(normalize_subtask(item, idx)).ok()?;
                task.dependencies.retain(|d| !d.is_empty());
                Some(task)
            })
            .collect();
        (!subtasks.is_empty()).then_some(subtasks)
    }

    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        let prompt = Self::build_prompt(&state.intent);
        let plan = match self.model.generate(PLANNER_SYSTEM, &prompt, &[]).await {
            Ok(reply) => extract_structured_object(&reply).map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };

        let parsed = plan.as_ref().ok().and_then(|plan| Some((plan, Self::parse_subtasks(plan)?)));
        match parsed {
            Some((plan, subtasks)) => {
                state.set_subtasks(subtasks);
                if let Some(estimate) = plan
                    .get("estimated_iterations")
                    .and_then(Value::as_u64)
                    .filter(|estimate| *estimate > 0)
                {
                    state.max_iterations = estimate.min(MAX_PLANNED_ITERATIONS as u64) as u32;
                }
            }
            None => {
                match &plan {
                    Err(reason) => warn!("Planner fell back to a single subtask: {}", reason),
                    Ok(_) => warn!("Planner fell back to a single subtask: no subtasks in reply"),
                }
                state.set_subtasks(vec![Subtask::new("task_1", state.intent.clone())]);
            }
        }
        info!("Planner: {} subtasks, {} iterations", state.subtasks.len(), state.max_iterations);
        state
    }
}

/// Fill in a missing id so that loosely formatted plans still deserialize
fn normalize_subtask(item: &Value, idx: usize) -> Value {
    let mut item = match item {
        Value::Object(obj) => obj.clone(),
        Value::String(text) => {
            let mut obj = Map::new();
            obj.insert("description".to_string(), Value::String(text.clone()));
            obj
        }
        _ => return Value::Null,
    };
    let id = match item.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("task_{}", idx + 1),
    };
    item.insert("id".to_string(), Value::String(id));
    Value::Object(item)
}

/// Writes the scene code for the current iteration
pub struct Designer {
    model: Arc<dyn FoundationModel>,
    system_prompt: String,
}

impl Designer {
    pub fn new(model: Arc<dyn FoundationModel>) -> Self {
        Self {
            model,
            system_prompt: DESIGNER_SYSTEM.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn build_prompt(state: &WorkflowState) -> String {
        let tasks: Vec<String> = state.subtasks.iter().map(|t| format!("- {}", t.description)).collect();

        let mut context = String::new();
        if let Some(report) = state.previous_report() {
            context.push_str(&format!(
                "Previous iteration feedback:\n- Quality score: {:.2}\n- Issues: {}\n- Suggestions: {}\n\n",
                report.overall_score,
                report.issues.join(", "),
                report.suggestions.join(", ")
            ));
        } else if let Some(HistoryEntry::ExecutionFailed { errors, .. }) = state.history.last() {
            context.push_str(&format!("Previous code failed to run:\n- {}\n\n", errors.join("\n- ")));
        }
        if !state.code.is_empty() {
            context.push_str(&format!("Current code:\n```python\n{}\n```\n\n", state.code));
        }

        format!(
            "Generate Blender Python code to accomplish the following:\n\n\
             User Intent: {}\n\n\
             Tasks to implement:\n{}\n\n\
             {}\
             Requirements:\n\
             1. Use only the bpy API\n\
             2. Print a JSON summary of created objects\n\
             3. Include error handling\n\
             4. Leave the scene in a state that reads well from the camera (angles, lighting)\n\n\
             Generate complete, executable Python code wrapped in ```python blocks.\n",
            state.intent,
            tasks.join("\n"),
            context
        )
    }

    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        let prompt = Self::build_prompt(&state);
        debug!("Designer prompt: {} chars", prompt.len());
        match self.model.generate(&self.system_prompt, &prompt, &[]).await {
            Ok(reply) => {
                state.code = extract_code(&reply);
                info!("Designer: code generated ({} chars)", state.code.len());
            }
            Err(err) => warn!("Designer failed, keeping current code: {}", err),
        }
        state.code_metadata = CodeMetadata {
            task_count: state.subtasks.len(),
            iteration: state.iteration,
        };
        state
    }
}

/// Runs the current code in the host and captures the result
pub struct Executor {
    host: Arc<dyn SceneHost>,
    capture_size: u32,
}

impl Executor {
    pub fn new(host: Arc<dyn SceneHost>, capture_size: u32) -> Self {
        Self { host, capture_size }
    }

    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        state.screenshot = None;
        if state.code.trim().is_empty() {
            state.execution_result = Some(ExecutionResult::error("No code to execute"));
            return state;
        }

        let result = self.host.execute(&state.code).await;
        if result.is_success() {
            match self.host.capture_observation(self.capture_size).await {
                Ok(observation) => state.screenshot = observation.image(),
                Err(err) => warn!("Executor: screenshot capture failed: {}", err),
            }
        } else {
            warn!("Executor: execution failed: {}", result.error_summary());
        }
        state.execution_result = Some(result);
        state
    }
}

/// Scores the latest screenshot
pub struct Evaluator {
    model: Arc<dyn FoundationModel>,
}

impl Evaluator {
    pub fn new(model: Arc<dyn FoundationModel>) -> Self {
        Self { model }
    }

    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        let Some(screenshot) = state.screenshot.clone() else {
            state.quality_score = 0.0;
            state.satisfied = false;
            state.report = Some(QualityReport::unobserved("No screenshot available for evaluation"));
            return state;
        };

        let evaluator = VisionEvaluator::new(self.model.clone()).with_threshold(state.threshold);
        let previous = state.previous_report();
        let report = if state.references.is_empty() {
            evaluator
                .analyze_scene(&screenshot, &state.intent, state.iteration, state.max_iterations, previous)
                .await
        } else {
            evaluator
                .compare_to_reference(
                    &screenshot,
                    &state.references,
                    &state.intent,
                    state.iteration,
                    state.max_iterations,
                    previous,
                )
                .await
        };

        state.quality_score = report.overall_score;
        state.satisfied = report.overall_score >= state.threshold || report.is_satisfactory;
        state.report = Some(report);
        state
    }
}

/// Produces targeted fix-up code from the evaluator's findings
pub struct Refiner {
    model: Arc<dyn FoundationModel>,
    system_prompt: String,
}

impl Refiner {
    pub fn new(model: Arc<dyn FoundationModel>) -> Self {
        Self {
            model,
            system_prompt: DESIGNER_SYSTEM.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn build_prompt(state: &WorkflowState, issues: &[String], suggestions: &[String]) -> String {
        let bullets = |items: &[String]| items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n");
        format!(
            "The current Blender scene needs improvement.\n\n\
             Original Goal: {}\n\
             Quality Score: {:.2} (threshold: {})\n\n\
             Issues Identified:\n{}\n\n\
             Specific Suggestions:\n{}\n\n\
             Generate Python code that applies ONLY these specific improvements.\n\
             Do NOT recreate the entire scene - just modify existing objects.\n\n\
             Focus on:\n\
             1. Adjusting lighting (energy, color, position)\n\
             2. Moving camera (location, rotation)\n\
             3. Tweaking materials (color, roughness, metallic)\n\
             4. Small geometry adjustments\n\n\
             Provide concise, targeted code that fixes the issues.\n",
            state.intent,
            state.quality_score,
            state.threshold,
            bullets(issues),
            bullets(suggestions)
        )
    }

    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.satisfied {
            state.suggestions.clear();
            return state;
        }

        let (issues, suggestions) = state
            .report
            .as_ref()
            .map(|r| (r.issues.clone(), r.suggestions.clone()))
            .unwrap_or_default();
        let prompt = Self::build_prompt(&state, &issues, &suggestions);

        match self.model.generate(&self.system_prompt, &prompt, &[]).await {
            Ok(reply) => {
                let code = extract_code(&reply);
                if code.is_empty() {
                    warn!("Refiner returned no code");
                } else {
                    state.code = code;
                    state.suggestions = suggestions;
                    info!("Refiner: {} suggestions applied", state.suggestions.len());
                }
            }
            Err(err) => warn!("Refiner failed: {}", err),
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostStatus;
    use crate::llm::{EncodedImage, GenerateRequest, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies in order; the last reply repeats
    struct ScriptedModel {
        replies: Vec<std::result::Result<String, ProviderError>>,
        prompts: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<std::result::Result<&str, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: replies.into_iter().map(|r| r.map(String::from)).collect(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompt(&self, idx: usize) -> GenerateRequest {
            self.prompts.lock().unwrap()[idx].clone()
        }
    }

    #[async_trait]
    impl FoundationModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn attempt(&self, request: &GenerateRequest) -> std::result::Result<String, ProviderError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.clone());
            let idx = (prompts.len() - 1).min(self.replies.len() - 1);
            self.replies[idx].clone()
        }
    }

    struct FixedHost {
        result: ExecutionResult,
    }

    #[async_trait]
    impl SceneHost for FixedHost {
        async fn execute(&self, code: &str) -> ExecutionResult {
            if code.contains("screenshot_area") {
                return ExecutionResult::success(r#"{"status": "success", "image_data": "PNGDATA", "width": 4, "height": 3}"#);
            }
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_planner_parses_subtasks_and_caps_iterations() {
        let model = ScriptedModel::new(vec![Ok(
            r#"```json
{"subtasks": [{"id": "task_1", "description": "Clean scene", "dependencies": []},
              {"id": "task_2", "description": "Add lamp", "dependencies": ["task_1"]}],
 "estimated_iterations": 9}
```"#,
        )]);
        let state = Planner::new(model).run(WorkflowState::new("A lamp")).await;
        assert_eq!(state.subtasks.len(), 2);
        assert_eq!(state.dependency_graph["task_2"], vec!["task_1"]);
        assert_eq!(state.max_iterations, 5);
    }

    #[tokio::test]
    async fn test_planner_lowers_iterations() {
        let model = ScriptedModel::new(vec![Ok(r#"{"subtasks": ["Add cube"], "estimated_iterations": 2}"#)]);
        let state = Planner::new(model).run(WorkflowState::new("cube")).await;
        assert_eq!(state.max_iterations, 2);
        assert_eq!(state.subtasks[0], Subtask::new("task_1", "Add cube"));
    }

    #[tokio::test]
    async fn test_planner_fallback_on_garbage() {
        let model = ScriptedModel::new(vec![Ok("I cannot plan this.")]);
        let state = Planner::new(model).run(WorkflowState::new("A red chair")).await;
        assert_eq!(state.subtasks, vec![Subtask::new("task_1", "A red chair")]);
        assert_eq!(state.max_iterations, 3);
    }

    #[tokio::test]
    async fn test_planner_fallback_on_provider_error() {
        let model = ScriptedModel::new(vec![Err(ProviderError::transport("refused"))]);
        let state = Planner::new(model).run(WorkflowState::new("A red chair")).await;
        assert_eq!(state.subtasks.len(), 1);
        assert_eq!(state.subtasks[0].description, "A red chair");
    }

    #[tokio::test]
    async fn test_designer_extracts_code_and_uses_feedback() {
        let model = ScriptedModel::new(vec![Ok("```python\nimport bpy\n```")]);
        let mut state = WorkflowState::new("room");
        state.set_subtasks(vec![Subtask::new("task_1", "Add floor")]);
        state.iteration = 1;
        let mut report = QualityReport::fallback("x");
        report.issues = vec!["too dark".to_string()];
        state.history.push(HistoryEntry::Evaluated { iteration: 0, report });

        let state = Designer::new(model.clone()).run(state).await;
        assert_eq!(state.code, "import bpy");
        assert_eq!(state.code_metadata, CodeMetadata { task_count: 1, iteration: 1 });

        let prompt = model.prompt(0).user;
        assert!(prompt.contains("- Add floor"));
        assert!(prompt.contains("- Quality score: 0.50"));
        assert!(prompt.contains("- Issues: too dark"));
    }

    #[tokio::test]
    async fn test_executor_captures_screenshot_on_success() {
        let host = Arc::new(FixedHost {
            result: ExecutionResult::success("ok"),
        });
        let mut state = WorkflowState::new("room");
        state.code = "import bpy".to_string();

        let state = Executor::new(host, 512).run(state).await;
        assert!(state.execution_succeeded());
        assert_eq!(state.screenshot, Some(EncodedImage::new("PNGDATA")));
    }

    #[tokio::test]
    async fn test_executor_failure_leaves_no_screenshot() {
        let host = Arc::new(FixedHost {
            result: ExecutionResult::error("NameError: foo"),
        });
        let mut state = WorkflowState::new("room");
        state.code = "foo".to_string();
        state.screenshot = Some(EncodedImage::new("STALE"));

        let state = Executor::new(host, 512).run(state).await;
        let result = state.execution_result.clone().unwrap();
        assert_eq!(result.status, HostStatus::Error);
        assert!(state.screenshot.is_none());
    }

    #[tokio::test]
    async fn test_executor_empty_code_skips_host() {
        struct PanicHost;

        #[async_trait]
        impl SceneHost for PanicHost {
            async fn execute(&self, _code: &str) -> ExecutionResult {
                panic!("host must not be called");
            }
        }

        let state = Executor::new(Arc::new(PanicHost), 512).run(WorkflowState::new("room")).await;
        assert!(!state.execution_succeeded());
    }

    #[tokio::test]
    async fn test_evaluator_without_screenshot_scores_zero() {
        let model = ScriptedModel::new(vec![Ok("{}")]);
        let state = Evaluator::new(model.clone()).run(WorkflowState::new("room")).await;
        assert_eq!(state.quality_score, 0.0);
        assert!(!state.satisfied);
        assert!(state.report.unwrap().error.is_some());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evaluator_scores_screenshot() {
        let model = ScriptedModel::new(vec![Ok(
            r#"{"scores": {"composition": 8, "lighting": 8, "materials": 9, "camera": 7, "goal_match": 8}}"#,
        )]);
        let mut state = WorkflowState::new("room");
        state.screenshot = Some(EncodedImage::new("PNG"));

        let state = Evaluator::new(model).run(state).await;
        assert_eq!(state.quality_score, 0.8);
        assert!(state.satisfied);
    }

    #[tokio::test]
    async fn test_evaluator_provider_failure_is_neutral() {
        let model = ScriptedModel::new(vec![Err(ProviderError::timeout(std::time::Duration::from_secs(1)))]);
        let mut state = WorkflowState::new("room");
        state.screenshot = Some(EncodedImage::new("PNG"));

        let state = Evaluator::new(model).run(state).await;
        assert_eq!(state.quality_score, 0.5);
        assert!(!state.satisfied);
    }

    #[tokio::test]
    async fn test_refiner_skipped_when_satisfied() {
        let model = ScriptedModel::new(vec![Ok("```python\nfix()\n```")]);
        let mut state = WorkflowState::new("room");
        state.satisfied = true;
        state.code = "original()".to_string();
        state.suggestions = vec!["stale".to_string()];

        let state = Refiner::new(model.clone()).run(state).await;
        assert_eq!(state.code, "original()");
        assert!(state.suggestions.is_empty());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refiner_replaces_code() {
        let model = ScriptedModel::new(vec![Ok("```python\nlight.energy = 1000\n```")]);
        let mut state = WorkflowState::new("room");
        state.code = "original()".to_string();
        let mut report = QualityReport::fallback("x");
        report.issues = vec!["Too dark".to_string()];
        report.suggestions = vec!["Raise light energy".to_string()];
        state.quality_score = report.overall_score;
        state.report = Some(report);

        let state = Refiner::new(model.clone()).run(state).await;
        assert_eq!(state.code, "light.energy = 1000");
        assert_eq!(state.suggestions, vec!["Raise light energy"]);

        let prompt = model.prompt(0).user;
        assert!(prompt.contains("Quality Score: 0.50 (threshold: 0.75)"));
        assert!(prompt.contains("- Too dark"));
    }
}
