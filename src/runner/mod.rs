//! Loop runner module - the iterative analysis-by-synthesis controller.
//!
//! This module provides:
//! - LoopController, which sequences generator, host execution and verifier
//! - LoopReport and TerminationReason for the outcome of a run
//! - LoopControllerConfig with the iteration budget and convergence settings

mod loop_runner;

pub use loop_runner::{LoopController, LoopControllerConfig, LoopPhase, LoopReport, TerminationReason};
