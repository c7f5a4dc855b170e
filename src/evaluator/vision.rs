//! Vision evaluator: score renders with a multimodal model

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::quality::QualityReport;
use crate::artifact::extract_structured_object;
use crate::llm::{EncodedImage, FoundationModel};

const EVALUATOR_SYSTEM: &str = "You are an expert 3D scene evaluator analyzing Blender viewport screenshots.";

/// Default satisfaction threshold for scene analysis
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// Reference image with a label such as `blueprint_top` or `photo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub kind: String,
    pub image: EncodedImage,
}

impl ReferenceImage {
    pub fn new(kind: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            kind: kind.into(),
            image,
        }
    }
}

/// Which report shape to parse the reply into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyShape {
    Scene,
    Comparison,
}

/// Scores renders against the user's intent or reference images
pub struct VisionEvaluator {
    model: Arc<dyn FoundationModel>,
    threshold: f64,
}

impl VisionEvaluator {
    pub fn new(model: Arc<dyn FoundationModel>) -> Self {
        Self {
            model,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn build_scene_prompt(
        intent: &str,
        iteration: u32,
        max_iterations: u32,
        previous: Option<&QualityReport>,
        threshold: f64,
    ) -> String {
        let mut prompt = format!(
            "You are an expert 3D scene evaluator analyzing a Blender viewport screenshot.\n\n\
             **Original Goal**: {}\n\n\
             **Current Progress**: Iteration {} of {}\n\n",
            intent,
            iteration + 1,
            max_iterations
        );

        if let Some(previous) = previous {
            prompt.push_str(&format!(
                "**Previous Iteration Feedback**:\n- Score: {:.0}%\n- Issues: {}\n",
                previous.overall_score * 100.0,
                previous.issues.join(", ")
            ));
        }

        prompt.push_str(
            r#"
**Your Task**: Analyze this 3D scene and provide evaluation scores.

**Evaluation Criteria** (rate each 0-10):
1. **Composition**: Object placement, scene balance
2. **Lighting**: Quality, shadows, visibility
3. **Materials**: Realism, color, texture
4. **Camera**: Angle, framing, focus
5. **Goal Match**: Alignment with user intent

**Response Format** (JSON):
```json
{
    "scores": {
        "composition": <0-10>,
        "lighting": <0-10>,
        "materials": <0-10>,
        "camera": <0-10>,
        "goal_match": <0-10>
    },
    "overall_score": <0.0-1.0>,
    "is_satisfactory": <true/false>,
    "issues": ["issue 1", "issue 2"],
    "specific_suggestions": ["suggestion 1", "suggestion 2"],
    "positive_aspects": ["positive 1", "positive 2"]
}
```

Calculate overall_score as: (sum of all scores) / (5 * 10)
"#,
        );
        prompt.push_str(&format!(
            "Set is_satisfactory = true if overall_score >= {:.2}\n\n\
             Provide specific, actionable suggestions with parameter values.\n",
            threshold
        ));
        prompt
    }

    fn build_comparison_prompt(
        intent: &str,
        references: &[ReferenceImage],
        iteration: u32,
        max_iterations: u32,
        previous: Option<&QualityReport>,
        threshold: f64,
    ) -> String {
        let mut prompt = format!(
            "You are analyzing a 3D model for geometric accuracy against reference materials.\n\n\
             **Modeling Goal**: {}\n\n\
             **Progress**: Iteration {} of {}\n\n\
             **Images**: the first {} image(s) are references, the last image is the current render.\n",
            intent,
            iteration + 1,
            max_iterations,
            references.len()
        );
        for (idx, reference) in references.iter().enumerate() {
            prompt.push_str(&format!("- Reference Image {}: {}\n", idx + 1, reference.kind));
        }
        prompt.push('\n');

        if let Some(previous) = previous {
            let attempted: Vec<&str> = previous.suggestions.iter().take(3).map(String::as_str).collect();
            prompt.push_str(&format!(
                "**Previous Iteration**:\n- Score: {:.0}%\n- Discrepancies found: {}\n- Changes attempted: {}\n\n",
                previous.overall_score * 100.0,
                previous.issues.len(),
                attempted.join(", ")
            ));
        }

        prompt.push_str(
            r#"**Your Task**: Identify specific geometric discrepancies between the reference materials and the rendered 3D model.

**Focus Areas**:
1. **Positions & Spacing** of major components
2. **Proportions**: length-to-width ratios, heights, angles
3. **Structure**: placement and dimensions of secondary elements
4. **Details**: small features visible in the references

**Response Format** (JSON):
```json
{
    "overall_score": <0.0-1.0>,
    "is_satisfactory": <true/false>,
    "discrepancies": [
        {
            "component": "Main Turret 2",
            "type": "position|proportion|alignment|shape",
            "severity": "critical|moderate|minor",
            "quantitative": "Positioned 12% too far forward",
            "suggestion": "Move turret aft by approximately 15 meters"
        }
    ],
    "measurements": {
        "length_accuracy": <0.0-1.0>,
        "beam_accuracy": <0.0-1.0>,
        "proportions_match": <0.0-1.0>
    },
    "positive_aspects": ["..."]
}
```

**Quantitative Requirements**:
- Use percentages for proportion errors (e.g., "8% too narrow")
- Use relative distances for positioning
"#,
        );
        prompt.push_str(&format!(
            "\n**Scoring**:\n- overall_score = (length_accuracy + beam_accuracy + proportions_match) / 3\n\
             - is_satisfactory = true if overall_score >= {:.2}\n\nAnalyze the images now and identify all discrepancies.\n",
            threshold
        ));
        prompt
    }

    async fn evaluate(&self, prompt: &str, images: &[EncodedImage], shape: ReplyShape) -> QualityReport {
        let reply = match self.model.generate(EVALUATOR_SYSTEM, prompt, images).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Vision evaluation request failed: {}", err);
                return QualityReport::fallback(err.to_string());
            }
        };

        match extract_structured_object(&reply) {
            Ok(value) => {
                let report = match shape {
                    ReplyShape::Scene => QualityReport::from_model_json(&value, self.threshold),
                    ReplyShape::Comparison => QualityReport::from_comparison_json(&value, self.threshold),
                };
                info!(
                    "Vision evaluation: {:.2} (satisfactory={})",
                    report.overall_score, report.is_satisfactory
                );
                report
            }
            Err(err) => {
                warn!("Vision evaluation reply unparseable: {}", err);
                QualityReport::fallback(err.to_string())
            }
        }
    }

    /// Score a screenshot against the intent; never fails
    pub async fn analyze_scene(
        &self,
        screenshot: &EncodedImage,
        intent: &str,
        iteration: u32,
        max_iterations: u32,
        previous: Option<&QualityReport>,
    ) -> QualityReport {
        let prompt = Self::build_scene_prompt(intent, iteration, max_iterations, previous, self.threshold);
        self.evaluate(&prompt, std::slice::from_ref(screenshot), ReplyShape::Scene)
            .await
    }

    /// Score a render against reference images; references precede the render
    pub async fn compare_to_reference(
        &self,
        rendered: &EncodedImage,
        references: &[ReferenceImage],
        intent: &str,
        iteration: u32,
        max_iterations: u32,
        previous: Option<&QualityReport>,
    ) -> QualityReport {
        let prompt =
            Self::build_comparison_prompt(intent, references, iteration, max_iterations, previous, self.threshold);
        let mut images: Vec<EncodedImage> = references.iter().map(|r| r.image.clone()).collect();
        images.push(rendered.clone());
        self.evaluate(&prompt, &images, ReplyShape::Comparison).await
    }
}
