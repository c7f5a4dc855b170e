//! Skill Library
//!
//! Atomic scene actions used by the generator and verifier agents, plus the
//! viewpoint framing math and the host scripts behind them.

pub mod framing;
mod library;
pub mod scripts;

use thiserror::Error;

pub use framing::{Aabb, CameraPose, SceneBounds, compute_pose, frame_bounds};
pub use library::{Investigation, SkillLibrary};

use crate::host::HostError;
use crate::llm::ProviderError;

/// Errors from skills that touch both the host and the model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
