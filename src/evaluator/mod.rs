//! Quality evaluation of rendered scenes
//!
//! This module provides:
//! - QualityReport, the structured scoring result
//! - VisionEvaluator for intent scoring and reference comparison

mod quality;
mod vision;

pub use quality::{FALLBACK_SCORE, QualityReport, round2};
pub use vision::{DEFAULT_THRESHOLD, ReferenceImage, VisionEvaluator};
