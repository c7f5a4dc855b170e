//! Loop controller - drives the generate/execute/verify refinement loop.
//!
//! Each iteration moves through Planning → Executing → Verifying → Deciding.
//! Stage failures are absorbed into the iteration record as feedback so the
//! next iteration can react to them; only configuration errors and memory
//! contract violations escape `run`.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::agent::{DEFAULT_CAPTURE_SIZE, DEFAULT_SENTINEL, GeneratorAgent, VerifierAgent};
use crate::error::Result;
use crate::host::SceneHost;
use crate::llm::FoundationModel;
use crate::memory::{ContextMemory, Feedback, IterationRecord};
use crate::skills::SkillLibrary;

/// Phase of a single iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Planning,
    Executing,
    Verifying,
    Deciding,
    Terminated,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Verifier reported the task complete
    Converged,
    /// Iteration budget used up
    Exhausted,
    /// Too many consecutive iterations produced no code
    Blocked,
}

/// Configuration for the LoopController.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopControllerConfig {
    pub max_iterations: u32,
    pub window_size: usize,

    /// Substring in verifier feedback that ends the loop
    pub sentinel: String,

    /// Stop after this many iterations in a row without code; 0 disables
    pub max_consecutive_generation_failures: u32,

    /// Longest edge of captured observations
    pub capture_size: u32,
}

impl Default for LoopControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            window_size: 3,
            sentinel: DEFAULT_SENTINEL.to_string(),
            max_consecutive_generation_failures: 3,
            capture_size: DEFAULT_CAPTURE_SIZE,
        }
    }
}

/// Result of a loop run
#[derive(Debug, Clone, Serialize)]
pub struct LoopReport {
    pub memory: ContextMemory,
    pub reason: TerminationReason,
}

impl LoopReport {
    pub fn iterations(&self) -> usize {
        self.memory.len()
    }

    pub fn converged(&self) -> bool {
        self.reason == TerminationReason::Converged
    }

    /// Final program, or `""` if no iteration produced code
    pub fn final_code(&self) -> &str {
        self.memory.latest_code()
    }
}

/// LoopController runs the analysis-by-synthesis loop for one task.
pub struct LoopController {
    skills: SkillLibrary,
    generator: GeneratorAgent,
    verifier: VerifierAgent,
    config: LoopControllerConfig,
}

impl LoopController {
    /// Create a controller; one model serves both agents
    pub fn new(host: Arc<dyn SceneHost>, model: Arc<dyn FoundationModel>, config: LoopControllerConfig) -> Self {
        let skills = SkillLibrary::new(host, model.clone());
        let generator = GeneratorAgent::new(skills.clone(), model.clone());
        let verifier = VerifierAgent::new(skills.clone(), model)
            .with_sentinel(config.sentinel.clone())
            .with_capture_size(config.capture_size);
        Self {
            skills,
            generator,
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &LoopControllerConfig {
        &self.config
    }

    fn transition(iteration: u32, from: LoopPhase, to: LoopPhase) {
        debug!("Iteration {}: {:?} -> {:?}", iteration, from, to);
    }

    /// Run until convergence, budget exhaustion or a blocked generator.
    pub async fn run(&self, task: &str) -> Result<LoopReport> {
        let mut memory = ContextMemory::new(self.config.window_size)?.with_static_context("task", task);
        let mut consecutive_generation_failures = 0u32;

        info!(
            "Starting loop: max_iterations={} window={} model={}",
            self.config.max_iterations,
            self.config.window_size,
            self.skills.model().name()
        );

        for iteration in 0..self.config.max_iterations {
            info!("=== Iteration {}/{} ===", iteration + 1, self.config.max_iterations);

            let record = self.iterate(task, &memory, iteration).await;
            let converged = record
                .feedback
                .as_ref()
                .is_some_and(|f| f.is_converged(&self.config.sentinel));
            let generation_failed = matches!(record.feedback, Some(Feedback::GenerationError(_)));

            memory.append(record)?;

            if converged {
                Self::transition(iteration, LoopPhase::Deciding, LoopPhase::Terminated);
                info!("Convergence reached at iteration {}", iteration + 1);
                return Ok(LoopReport {
                    memory,
                    reason: TerminationReason::Converged,
                });
            }

            if generation_failed {
                consecutive_generation_failures += 1;
                let limit = self.config.max_consecutive_generation_failures;
                if limit > 0 && consecutive_generation_failures >= limit {
                    Self::transition(iteration, LoopPhase::Deciding, LoopPhase::Terminated);
                    warn!("Generator produced no code for {} iterations; stopping", limit);
                    return Ok(LoopReport {
                        memory,
                        reason: TerminationReason::Blocked,
                    });
                }
            } else {
                consecutive_generation_failures = 0;
            }
            Self::transition(iteration, LoopPhase::Deciding, LoopPhase::Planning);
        }

        info!("Iteration budget exhausted after {} iteration(s)", memory.len());
        Ok(LoopReport {
            memory,
            reason: TerminationReason::Exhausted,
        })
    }

    /// One pass through Planning, Executing and Verifying
    async fn iterate(&self, task: &str, memory: &ContextMemory, iteration: u32) -> IterationRecord {
        // Planning
        let record = match self.generator.generate_step(task, memory, iteration).await {
            Ok(record) if record.code().is_some() => record,
            Ok(record) => {
                warn!("Iteration {}: generator returned no code", iteration);
                return record.with_feedback(Feedback::GenerationError("empty code artifact".to_string()));
            }
            Err(err) => {
                warn!("Iteration {}: generation failed: {}", iteration, err);
                return IterationRecord::new(iteration).with_feedback(Feedback::GenerationError(err.to_string()));
            }
        };
        Self::transition(iteration, LoopPhase::Planning, LoopPhase::Executing);

        // Executing
        let code = record.code().unwrap_or_default().to_string();
        let result = self.skills.execute_code(&code).await;
        let record = record.with_execution_result(result.summary());
        if !result.is_success() {
            warn!("Iteration {}: execution error: {}", iteration, result.error_summary());
            Self::transition(iteration, LoopPhase::Executing, LoopPhase::Deciding);
            return record.with_feedback(Feedback::ExecutionError(format!(
                "Execution Error: {}",
                result.error_summary()
            )));
        }
        Self::transition(iteration, LoopPhase::Executing, LoopPhase::Verifying);

        // Verifying
        let feedback = match self.verifier.verify_step(task, &record).await {
            Ok(feedback) => feedback,
            Err(err) => {
                warn!("Iteration {}: verification failed: {}", iteration, err);
                Feedback::Visual(format!("Verification unavailable: {}", err))
            }
        };
        debug!("Iteration {} feedback: {}", iteration, crate::artifact::truncate(&feedback.text(), 100));
        Self::transition(iteration, LoopPhase::Verifying, LoopPhase::Deciding);

        record.with_feedback(feedback)
    }
}
