//! Multi-stage scene pipeline
//!
//! This module provides:
//! - WorkflowState, the record threaded through every stage
//! - Planner, Designer, Executor, Evaluator and Refiner stages
//! - Orchestrator, which sequences the stages over an iteration budget

mod orchestrator;
mod stages;
mod state;

use serde::{Deserialize, Serialize};

pub use orchestrator::Orchestrator;
pub use stages::{DESIGNER_SYSTEM, Designer, Evaluator, Executor, Planner, Refiner};
pub use state::{CodeMetadata, HistoryEntry, MAX_PLANNED_ITERATIONS, Subtask, WorkflowState};

use crate::agent::DEFAULT_CAPTURE_SIZE;
use crate::evaluator::DEFAULT_THRESHOLD;

/// Pipeline defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    pub satisfaction_threshold: f64,
    pub capture_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            satisfaction_threshold: DEFAULT_THRESHOLD,
            capture_size: DEFAULT_CAPTURE_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Fresh state for `intent` using these defaults
    pub fn initial_state(&self, intent: impl Into<String>) -> WorkflowState {
        WorkflowState::new(intent)
            .with_max_iterations(self.max_iterations)
            .with_threshold(self.satisfaction_threshold)
    }
}
