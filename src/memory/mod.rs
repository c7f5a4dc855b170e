//! Context memory for the refinement loop.
//!
//! This module provides:
//! - IterationRecord, one per loop iteration
//! - Feedback attached to a record
//! - ContextMemory with a sliding window used to build the next prompt

mod context;
mod record;

pub use context::ContextMemory;
pub use record::{Feedback, IterationRecord};
