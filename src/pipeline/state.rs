//! Workflow state threaded through the pipeline stages

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluator::{QualityReport, ReferenceImage};
use crate::host::ExecutionResult;
use crate::llm::EncodedImage;

/// Upper bound the planner may raise or lower the iteration budget to
pub const MAX_PLANNED_ITERATIONS: u32 = 5;

/// One unit of planned work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Subtask {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: Vec::new(),
        }
    }
}

/// Bookkeeping about the current code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub task_count: usize,
    pub iteration: u32,
}

/// What happened in one pipeline iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HistoryEntry {
    ExecutionFailed { iteration: u32, errors: Vec<String> },
    Evaluated { iteration: u32, report: QualityReport },
}

impl HistoryEntry {
    pub fn iteration(&self) -> u32 {
        match self {
            HistoryEntry::ExecutionFailed { iteration, .. } | HistoryEntry::Evaluated { iteration, .. } => *iteration,
        }
    }

    pub fn report(&self) -> Option<&QualityReport> {
        match self {
            HistoryEntry::Evaluated { report, .. } => Some(report),
            HistoryEntry::ExecutionFailed { .. } => None,
        }
    }
}

/// State passed from stage to stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub intent: String,
    pub iteration: u32,
    pub max_iterations: u32,
    pub threshold: f64,

    pub subtasks: Vec<Subtask>,
    pub dependency_graph: BTreeMap<String, Vec<String>>,

    pub code: String,
    pub code_metadata: CodeMetadata,

    pub execution_result: Option<ExecutionResult>,
    pub screenshot: Option<EncodedImage>,

    pub quality_score: f64,
    pub report: Option<QualityReport>,
    pub satisfied: bool,

    /// Suggestions the refiner acted on last
    pub suggestions: Vec<String>,

    pub references: Vec<ReferenceImage>,
    pub history: Vec<HistoryEntry>,
}

impl WorkflowState {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            iteration: 0,
            max_iterations: 3,
            threshold: 0.75,
            subtasks: Vec::new(),
            dependency_graph: BTreeMap::new(),
            code: String::new(),
            code_metadata: CodeMetadata::default(),
            execution_result: None,
            screenshot: None,
            quality_score: 0.0,
            report: None,
            satisfied: false,
            suggestions: Vec::new(),
            references: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_references(mut self, references: Vec<ReferenceImage>) -> Self {
        self.references = references;
        self
    }

    /// Replace the plan and rebuild the dependency graph
    pub fn set_subtasks(&mut self, subtasks: Vec<Subtask>) {
        self.dependency_graph = subtasks
            .iter()
            .map(|task| (task.id.clone(), task.dependencies.clone()))
            .collect();
        self.subtasks = subtasks;
    }

    /// Report of the most recent evaluated iteration
    pub fn previous_report(&self) -> Option<&QualityReport> {
        self.history.last().and_then(HistoryEntry::report)
    }

    pub fn execution_succeeded(&self) -> bool {
        self.execution_result.as_ref().is_some_and(ExecutionResult::is_success)
    }
}
