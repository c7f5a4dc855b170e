//! CLI module for sceneloop - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for the refinement loop,
//! the staged pipeline and the model availability check.

pub mod commands;

pub use commands::{Cli, Commands};
