//! Iteration records and the feedback attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluator::QualityReport;

/// Feedback attached to an iteration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Feedback {
    /// Natural-language judgment from the verifier
    Visual(String),
    /// The host reported failure; verification was skipped
    ExecutionError(String),
    /// No code could be generated this iteration
    GenerationError(String),
    /// Structured scoring result
    Quality(QualityReport),
}

impl Feedback {
    /// Heading used when rendering the feedback into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Feedback::Visual(_) => "Verifier Feedback",
            Feedback::ExecutionError(_) => "Execution Error",
            Feedback::GenerationError(_) => "Generation Error",
            Feedback::Quality(_) => "Quality Feedback",
        }
    }

    /// Text form of the feedback.
    pub fn text(&self) -> String {
        match self {
            Feedback::Visual(text) | Feedback::ExecutionError(text) | Feedback::GenerationError(text) => text.clone(),
            Feedback::Quality(report) => report.summary(),
        }
    }

    /// Whether the feedback signals that the task is complete.
    ///
    /// Text feedback converges on a substring match of `sentinel`; structured
    /// feedback converges on its satisfaction flag.
    pub fn is_converged(&self, sentinel: &str) -> bool {
        match self {
            Feedback::Visual(text) => !sentinel.is_empty() && text.contains(sentinel),
            Feedback::Quality(report) => report.is_satisfactory,
            Feedback::ExecutionError(_) | Feedback::GenerationError(_) => false,
        }
    }

    pub fn is_verifier_judgment(&self) -> bool {
        matches!(self, Feedback::Visual(_) | Feedback::Quality(_))
    }
}

/// One pass of generate/execute/verify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Position in the run, assigned by the loop controller
    pub sequence_number: u32,

    /// Output of the planning step
    pub plan: Option<String>,

    /// Code sent to the host this iteration
    pub code_artifact: Option<String>,

    /// Raw outcome or error summary from the host
    pub execution_result: Option<String>,

    /// Verifier, evaluator or failure feedback
    pub feedback: Option<Feedback>,

    pub recorded_at: DateTime<Utc>,
}

impl IterationRecord {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            sequence_number,
            plan: None,
            code_artifact: None,
            execution_result: None,
            feedback: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code_artifact = Some(code.into());
        self
    }

    pub fn with_execution_result(mut self, result: impl Into<String>) -> Self {
        self.execution_result = Some(result.into());
        self
    }

    pub fn with_feedback(mut self, feedback: Feedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Code artifact, if present and non-empty.
    pub fn code(&self) -> Option<&str> {
        self.code_artifact.as_deref().filter(|c| !c.is_empty())
    }

    /// Format for model context consumption.
    ///
    /// Absent fields are omitted rather than rendered as placeholders.
    pub fn to_prompt_block(&self) -> String {
        let mut parts = vec![format!("## Iteration {}", self.sequence_number)];

        if let Some(plan) = self.plan.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("**Plan**: {}", plan));
        }
        if let Some(code) = self.code() {
            parts.push(format!("**Code Generated**: \n```python\n{}\n```", code));
        }
        if let Some(feedback) = &self.feedback {
            parts.push(format!("**{}**: {}", feedback.label(), feedback.text()));
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record() {
        let record = IterationRecord::new(0);
        assert_eq!(record.sequence_number, 0);
        assert!(record.plan.is_none());
        assert!(record.code().is_none());
        assert_eq!(record.to_prompt_block(), "## Iteration 0");
    }

    #[test]
    fn test_prompt_block_full() {
        let record = IterationRecord::new(2)
            .with_plan("Add a cube")
            .with_code("import bpy")
            .with_feedback(Feedback::Visual("Cube is too small".to_string()));

        let block = record.to_prompt_block();
        assert_eq!(
            block,
            "## Iteration 2\n**Plan**: Add a cube\n**Code Generated**: \n```python\nimport bpy\n```\n**Verifier Feedback**: Cube is too small"
        );
    }

    #[test]
    fn test_prompt_block_omits_execution_result_and_empty_code() {
        let record = IterationRecord::new(1)
            .with_code("")
            .with_execution_result("{\"status\": \"success\"}");
        assert_eq!(record.to_prompt_block(), "## Iteration 1");
    }

    #[test]
    fn test_execution_error_label() {
        let record =
            IterationRecord::new(3).with_feedback(Feedback::ExecutionError("NameError: bpy".to_string()));
        assert!(record.to_prompt_block().contains("**Execution Error**: NameError: bpy"));
    }

    #[test]
    fn test_feedback_convergence() {
        let sentinel = "OBJECTIVE COMPLETE";
        assert!(Feedback::Visual("All good. OBJECTIVE COMPLETE".to_string()).is_converged(sentinel));
        assert!(!Feedback::Visual("Move the lamp".to_string()).is_converged(sentinel));
        assert!(!Feedback::ExecutionError("OBJECTIVE COMPLETE".to_string()).is_converged(sentinel));
        assert!(!Feedback::Visual("anything".to_string()).is_converged(""));

        let mut report = QualityReport::fallback("x");
        assert!(!Feedback::Quality(report.clone()).is_converged(sentinel));
        report.is_satisfactory = true;
        assert!(Feedback::Quality(report).is_converged(sentinel));
    }

    #[test]
    fn test_feedback_serialization() {
        let feedback = Feedback::ExecutionError("boom".to_string());
        let json = serde_json::to_value(&feedback).unwrap();
        assert_eq!(json["kind"], "execution_error");
        assert_eq!(json["detail"], "boom");
    }
}
