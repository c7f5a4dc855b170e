//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: the generate/execute/verify refinement loop
//! - pipeline: the plan/design/execute/evaluate/refine pipeline
//! - check-model: verify the selected model is reachable

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sceneloop - vision-guided procedural 3D scene construction
#[derive(Parser, Debug)]
#[command(name = "sceneloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine a scene with the generator/verifier loop
    Run {
        /// What the scene should look like
        #[arg(short, long)]
        task: String,

        /// Model name (qwen3-vl-30b, qwen3-vl-8b, gemini-pro, gemini-flash, mock)
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of iterations
        #[arg(short, long)]
        iters: Option<u32>,

        /// Number of recent iterations shown to the models
        #[arg(short, long)]
        window: Option<usize>,

        /// Write the iteration history as JSON lines
        #[arg(long)]
        history_out: Option<PathBuf>,
    },

    /// Build a scene with the planner/designer/evaluator pipeline
    Pipeline {
        /// What the scene should look like
        #[arg(short, long)]
        intent: String,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of iterations
        #[arg(short = 'n', long)]
        iters: Option<u32>,

        /// Satisfaction threshold (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Reference image; may be repeated
        #[arg(short, long)]
        reference: Vec<PathBuf>,
    },

    /// Check that the model endpoint is reachable and serving the model
    CheckModel {
        /// Model name
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["sceneloop"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["sceneloop", "-v", "check-model"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["sceneloop", "check-model", "--config", "/tmp/sceneloop.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sceneloop.yml")));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::try_parse_from([
            "sceneloop",
            "run",
            "--task",
            "A red cube on a table",
            "--model",
            "mock",
            "--iters",
            "4",
            "--window",
            "2",
            "--history-out",
            "history.jsonl",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                task,
                model,
                iters,
                window,
                history_out,
            } => {
                assert_eq!(task, "A red cube on a table");
                assert_eq!(model.as_deref(), Some("mock"));
                assert_eq!(iters, Some(4));
                assert_eq!(window, Some(2));
                assert_eq!(history_out, Some(PathBuf::from("history.jsonl")));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_requires_task() {
        assert!(Cli::try_parse_from(["sceneloop", "run"]).is_err());
    }

    #[test]
    fn test_pipeline_command_with_references() {
        let cli = Cli::try_parse_from([
            "sceneloop",
            "pipeline",
            "--intent",
            "Battleship",
            "--threshold",
            "0.85",
            "--reference",
            "top.png",
            "--reference",
            "side.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Pipeline {
                intent,
                threshold,
                reference,
                iters,
                ..
            } => {
                assert_eq!(intent, "Battleship");
                assert_eq!(threshold, Some(0.85));
                assert_eq!(reference, vec![PathBuf::from("top.png"), PathBuf::from("side.png")]);
                assert_eq!(iters, None);
            }
            _ => panic!("Expected Pipeline command"),
        }
    }

    #[test]
    fn test_check_model_command() {
        let cli = Cli::try_parse_from(["sceneloop", "check-model", "-m", "gemini-flash"]).unwrap();
        match cli.command {
            Commands::CheckModel { model } => assert_eq!(model.as_deref(), Some("gemini-flash")),
            _ => panic!("Expected CheckModel command"),
        }
    }
}
