//! Structured quality reports

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound of a sub-score
pub const MAX_SUB_SCORE: f64 = 10.0;

/// Overall score reported when the model output could not be used
pub const FALLBACK_SCORE: f64 = 0.5;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scored judgment of a rendered scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Named sub-scores on a 0-10 scale
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,

    /// 0.0-1.0
    pub overall_score: f64,

    pub is_satisfactory: bool,

    #[serde(default)]
    pub issues: Vec<String>,

    #[serde(default)]
    pub suggestions: Vec<String>,

    #[serde(default)]
    pub positive_aspects: Vec<String>,

    /// Diagnostic when the report is a fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QualityReport {
    /// Report from named sub-scores
    pub fn from_scores(scores: BTreeMap<String, f64>, threshold: f64) -> Self {
        let overall = overall_from_scores(&scores).unwrap_or(0.0);
        Self {
            scores,
            overall_score: overall,
            is_satisfactory: overall >= threshold,
            issues: Vec::new(),
            suggestions: Vec::new(),
            positive_aspects: Vec::new(),
            error: None,
        }
    }

    /// Derive a report from the evaluator's JSON reply
    ///
    /// The overall score is recomputed from `scores` when present; the model's
    /// own `overall_score` is used only when no sub-scores came back.
    pub fn from_model_json(value: &Map<String, Value>, threshold: f64) -> Self {
        let scores = number_map(value.get("scores"), false);
        let overall = overall_from_scores(&scores)
            .or_else(|| value.get("overall_score").and_then(Value::as_f64).map(|s| round2(s.clamp(0.0, 1.0))))
            .unwrap_or(0.0);
        let asserted = value.get("is_satisfactory").and_then(Value::as_bool).unwrap_or(false);

        let mut suggestions = string_list(value.get("specific_suggestions"));
        suggestions.extend(string_list(value.get("suggestions")));

        Self {
            scores,
            overall_score: overall,
            is_satisfactory: overall >= threshold || asserted,
            issues: string_list(value.get("issues")),
            suggestions,
            positive_aspects: string_list(value.get("positive_aspects")),
            error: None,
        }
    }

    /// Derive a report from a reference-comparison reply
    ///
    /// `measurements` become sub-scores (0-1 values are scaled to 0-10) and
    /// each discrepancy contributes an issue and a suggestion.
    pub fn from_comparison_json(value: &Map<String, Value>, threshold: f64) -> Self {
        let mut report = Self::from_model_json(value, threshold);
        let measurements = number_map(value.get("measurements"), true);
        if !measurements.is_empty() {
            report.scores.extend(measurements);
            report.overall_score = overall_from_scores(&report.scores).unwrap_or(report.overall_score);
            let asserted = value.get("is_satisfactory").and_then(Value::as_bool).unwrap_or(false);
            report.is_satisfactory = report.overall_score >= threshold || asserted;
        }

        if let Some(discrepancies) = value.get("discrepancies").and_then(Value::as_array) {
            for d in discrepancies {
                let field = |key: &str| d.get(key).and_then(Value::as_str).unwrap_or_default();
                let component = field("component");
                let detail = match (field("quantitative"), field("type")) {
                    ("", kind) => kind,
                    (quantitative, _) => quantitative,
                };
                let severity = field("severity");
                let issue = match (severity.is_empty(), component.is_empty()) {
                    (false, false) => format!("[{}] {}: {}", severity, component, detail),
                    (true, false) => format!("{}: {}", component, detail),
                    _ => detail.to_string(),
                };
                if !issue.is_empty() {
                    report.issues.push(issue);
                }
                let suggestion = field("suggestion");
                if !suggestion.is_empty() {
                    report.suggestions.push(suggestion.to_string());
                }
            }
        }
        report
    }

    /// Neutral report used when the model reply could not be parsed or obtained
    pub fn fallback(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            scores: BTreeMap::new(),
            overall_score: FALLBACK_SCORE,
            is_satisfactory: false,
            issues: vec![format!("Vision model response parsing failed: {}", reason)],
            suggestions: vec!["Review vision model output format".to_string()],
            positive_aspects: Vec::new(),
            error: Some(reason),
        }
    }

    /// Zero-score report when there was nothing to look at
    pub fn unobserved(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            scores: BTreeMap::new(),
            overall_score: 0.0,
            is_satisfactory: false,
            issues: vec![format!("No observation available: {}", reason)],
            suggestions: Vec::new(),
            positive_aspects: Vec::new(),
            error: Some(reason),
        }
    }

    /// One-paragraph text form for prompts and logs
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Score {:.2} ({})",
            self.overall_score,
            if self.is_satisfactory { "satisfactory" } else { "needs work" }
        );
        if !self.issues.is_empty() {
            out.push_str(&format!(". Issues: {}", self.issues.join("; ")));
        }
        if !self.suggestions.is_empty() {
            out.push_str(&format!(". Suggestions: {}", self.suggestions.join("; ")));
        }
        out
    }
}

/// `round2(mean(scores) / 10)`, or `None` without scores
fn overall_from_scores(scores: &BTreeMap<String, f64>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    Some(round2(mean / MAX_SUB_SCORE))
}

/// Numeric entries of a JSON object, clamped to 0-10
fn number_map(value: Option<&Value>, scale_unit_interval: bool) -> BTreeMap<String, f64> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                .map(|(k, n)| {
                    let n = if scale_unit_interval && n <= 1.0 { n * MAX_SUB_SCORE } else { n };
                    (k, n.clamp(0.0, MAX_SUB_SCORE))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}
