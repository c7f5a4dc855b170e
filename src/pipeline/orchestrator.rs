//! Orchestrator: plan once, then design, execute, evaluate and refine until
//! the scene is good enough or the iteration budget runs out.

use std::sync::Arc;

use log::{info, warn};

use super::PipelineConfig;
use super::stages::{Designer, Evaluator, Executor, Planner, Refiner};
use super::state::{HistoryEntry, WorkflowState};
use crate::host::SceneHost;
use crate::llm::FoundationModel;

pub struct Orchestrator {
    planner: Planner,
    designer: Designer,
    executor: Executor,
    evaluator: Evaluator,
    refiner: Refiner,
}

impl Orchestrator {
    /// `model` writes plans and code, `vision_model` scores screenshots
    pub fn new(
        host: Arc<dyn SceneHost>,
        model: Arc<dyn FoundationModel>,
        vision_model: Arc<dyn FoundationModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            planner: Planner::new(model.clone()),
            designer: Designer::new(model.clone()),
            executor: Executor::new(host, config.capture_size),
            evaluator: Evaluator::new(vision_model),
            refiner: Refiner::new(model),
        }
    }

    /// Use a custom system prompt for the code-writing stages
    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.designer = self.designer.with_system_prompt(system_prompt);
        self.refiner = self.refiner.with_system_prompt(system_prompt);
        self
    }

    pub async fn run(&self, state: WorkflowState) -> WorkflowState {
        info!("Orchestrator: planning '{}'", state.intent);
        let mut state = self.planner.run(state).await;

        let mut iteration = 0;
        while iteration < state.max_iterations {
            state.iteration = iteration;
            info!("Orchestrator: iteration {}/{}", iteration + 1, state.max_iterations);

            state = self.designer.run(state).await;
            state = self.executor.run(state).await;

            if !state.execution_succeeded() {
                let errors = state
                    .execution_result
                    .as_ref()
                    .map(|r| if r.errors.is_empty() { vec![r.error_summary()] } else { r.errors.clone() })
                    .unwrap_or_default();
                warn!("Orchestrator: execution failed: {}", errors.join("; "));
                state.history.push(HistoryEntry::ExecutionFailed { iteration, errors });
                iteration += 1;
                continue;
            }

            state = self.evaluator.run(state).await;
            info!("Orchestrator: quality score {:.2}", state.quality_score);
            if let Some(report) = state.report.clone() {
                state.history.push(HistoryEntry::Evaluated { iteration, report });
            }

            if state.satisfied {
                info!("Orchestrator: quality threshold met");
                break;
            }

            if iteration + 1 < state.max_iterations {
                state = self.refiner.run(state).await;
            }
            iteration += 1;
        }

        info!(
            "Orchestrator: finished after {} iteration(s), score {:.2}, satisfied={}",
            state.history.len(),
            state.quality_score,
            state.satisfied
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ExecutionResult;
    use crate::llm::{GenerateRequest, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Planner reply for plan prompts, code for everything else
    struct CodeModel {
        plan: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    impl CodeModel {
        fn new(plan: &'static str) -> Arc<Self> {
            Arc::new(Self {
                plan,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FoundationModel for CodeModel {
        fn name(&self) -> &str {
            "code"
        }

        async fn attempt(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(request.user.clone());
            if request.user.contains("planning expert") {
                Ok(self.plan.to_string())
            } else {
                Ok("```python\nimport bpy\n```".to_string())
            }
        }
    }

    /// Returns one score per call, repeating the last
    struct ScoreModel {
        scores: Vec<u32>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl FoundationModel for ScoreModel {
        fn name(&self) -> &str {
            "score"
        }

        async fn attempt(&self, _request: &GenerateRequest) -> Result<String, ProviderError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let score = self.scores[idx.min(self.scores.len() - 1)];
            Ok(format!(
                r#"{{"scores": {{"composition": {s}, "lighting": {s}, "materials": {s}, "camera": {s}, "goal_match": {s}}}, "issues": ["needs work"]}}"#,
                s = score
            ))
        }
    }

    struct CountingHost {
        succeed: bool,
        executions: AtomicU32,
    }

    #[async_trait]
    impl SceneHost for CountingHost {
        async fn execute(&self, code: &str) -> ExecutionResult {
            if code.contains("screenshot_area") {
                return ExecutionResult::success(r#"{"status": "success", "image_data": "PNG", "width": 1, "height": 1}"#);
            }
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                ExecutionResult::success("")
            } else {
                ExecutionResult::error("Traceback: NameError")
            }
        }
    }

    fn host(succeed: bool) -> Arc<CountingHost> {
        Arc::new(CountingHost {
            succeed,
            executions: AtomicU32::new(0),
        })
    }

    const PLAN: &str = r#"{"subtasks": [{"id": "task_1", "description": "Add cube"}]}"#;

    #[tokio::test]
    async fn test_stops_when_satisfied() {
        let host = host(true);
        let model = CodeModel::new(PLAN);
        let vision = Arc::new(ScoreModel {
            scores: vec![5, 9],
            calls: AtomicU32::new(0),
        });
        let orchestrator = Orchestrator::new(host.clone(), model.clone(), vision.clone(), &PipelineConfig::default());

        let state = orchestrator.run(WorkflowState::new("A cube").with_max_iterations(3)).await;
        assert!(state.satisfied);
        assert_eq!(state.quality_score, 0.9);
        assert_eq!(state.history.len(), 2);
        assert_eq!(host.executions.load(Ordering::SeqCst), 2);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);

        // plan, design, refine, design
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[2].starts_with("The current Blender scene needs improvement."));
    }

    #[tokio::test]
    async fn test_failed_execution_continues_without_evaluation() {
        let host = host(false);
        let model = CodeModel::new(PLAN);
        let vision = Arc::new(ScoreModel {
            scores: vec![10],
            calls: AtomicU32::new(0),
        });
        let orchestrator = Orchestrator::new(host.clone(), model, vision.clone(), &PipelineConfig::default());

        let state = orchestrator.run(WorkflowState::new("A cube").with_max_iterations(3)).await;
        assert!(!state.satisfied);
        assert_eq!(state.history.len(), 3);
        assert!(
            state
                .history
                .iter()
                .all(|e| matches!(e, HistoryEntry::ExecutionFailed { errors, .. } if errors == &vec!["Traceback: NameError".to_string()]))
        );
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_refine_on_last_iteration() {
        let host = host(true);
        let model = CodeModel::new(r#"{"subtasks": ["Add cube"], "estimated_iterations": 2}"#);
        let vision = Arc::new(ScoreModel {
            scores: vec![3],
            calls: AtomicU32::new(0),
        });
        let orchestrator = Orchestrator::new(host, model.clone(), vision, &PipelineConfig::default());

        let state = orchestrator.run(WorkflowState::new("A cube")).await;
        assert_eq!(state.max_iterations, 2);
        assert_eq!(state.history.len(), 2);
        assert!(!state.satisfied);
        assert_eq!(state.quality_score, 0.3);

        // plan, design, refine, design
        assert_eq!(model.prompts.lock().unwrap().len(), 4);
    }
}
