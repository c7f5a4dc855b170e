//! Sceneloop - vision-guided procedural 3D scene construction
//!
//! A foundation model writes Blender Python, a live Blender session runs it,
//! and a multimodal model looks at the result and says what to change. The
//! loop repeats until the verifier is satisfied or the budget runs out.

pub mod agent;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod runner;
pub mod skills;

pub use error::{Result, SceneloopError};
