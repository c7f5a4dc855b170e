use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sceneloop::cli::{Cli, Commands};
use sceneloop::config::Config;
use sceneloop::evaluator::ReferenceImage;
use sceneloop::host::{SceneHost, SocketHost};
use sceneloop::llm::{EncodedImage, FoundationModel, select_model};
use sceneloop::pipeline::{HistoryEntry, Orchestrator};
use sceneloop::runner::{LoopController, TerminationReason};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sceneloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("sceneloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            task,
            model,
            iters,
            window,
            history_out,
        } => handle_run_command(task, model.as_deref(), *iters, *window, history_out.as_deref(), config).await,
        Commands::Pipeline {
            intent,
            model,
            iters,
            threshold,
            reference,
        } => handle_pipeline_command(intent, model.as_deref(), *iters, *threshold, reference, config).await,
        Commands::CheckModel { model } => handle_check_model_command(model.as_deref(), &config).await,
    }
}

async fn connect_model(name: Option<&str>, config: &Config) -> Result<Arc<dyn FoundationModel>> {
    let name = name.unwrap_or(&config.models.default_model);
    let model = select_model(name, &config.models).context("Failed to configure model")?;
    model
        .check_available()
        .await
        .context(format!("Model {} is not available", model.name()))?;
    Ok(model)
}

async fn handle_run_command(
    task: &str,
    model: Option<&str>,
    iters: Option<u32>,
    window: Option<usize>,
    history_out: Option<&Path>,
    mut config: Config,
) -> Result<()> {
    if let Some(iters) = iters {
        config.runner.max_iterations = iters;
    }
    if let Some(window) = window {
        config.runner.window_size = window;
    }
    config.validate()?;

    let model = connect_model(model, &config).await?;
    println!("{} {} ({})", "Task:".green(), task, model.name().cyan());

    let host: Arc<dyn SceneHost> = Arc::new(SocketHost::new(config.host.clone()));
    let controller = LoopController::new(host, model, config.runner.clone());
    let report = controller.run(task).await.context("Loop failed")?;

    for record in report.memory.records() {
        let status = match &record.feedback {
            Some(feedback) if feedback.is_verifier_judgment() => feedback.label().cyan(),
            Some(feedback) => feedback.label().red(),
            None => "no feedback".dimmed(),
        };
        println!("  {} {}", format!("#{}", record.sequence_number).bold(), status);
    }

    let reason = match report.reason {
        TerminationReason::Converged => "converged".green(),
        TerminationReason::Exhausted => "iteration budget exhausted".yellow(),
        TerminationReason::Blocked => "blocked: no code generated".red(),
    };
    println!("{} {} after {} iteration(s)", "Done:".green(), reason, report.iterations());

    if let Some(path) = history_out {
        report.memory.export_jsonl(path).context("Failed to write history")?;
        println!("{} {}", "History:".green(), path.display());
    }

    let code = report.final_code();
    if !code.is_empty() {
        println!("\n{}\n{}", "Final code:".bold(), code);
    }
    Ok(())
}

fn load_reference(path: &Path) -> Result<ReferenceImage> {
    let bytes = fs::read(path).context(format!("Failed to read reference {}", path.display()))?;
    let kind = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| eyre!("Reference path has no file name: {}", path.display()))?;
    Ok(ReferenceImage::new(kind, EncodedImage::from_bytes(&bytes)))
}

async fn handle_pipeline_command(
    intent: &str,
    model: Option<&str>,
    iters: Option<u32>,
    threshold: Option<f64>,
    references: &[PathBuf],
    mut config: Config,
) -> Result<()> {
    if let Some(iters) = iters {
        config.pipeline.max_iterations = iters;
    }
    if let Some(threshold) = threshold {
        config.pipeline.satisfaction_threshold = threshold;
    }
    config.validate()?;

    let references = references
        .iter()
        .map(|p| load_reference(p))
        .collect::<Result<Vec<_>>>()?;

    let model = connect_model(model, &config).await?;
    println!("{} {} ({})", "Intent:".green(), intent, model.name().cyan());

    let host: Arc<dyn SceneHost> = Arc::new(SocketHost::new(config.host.clone()));
    let orchestrator = Orchestrator::new(host, model.clone(), model, &config.pipeline);
    let state = config.pipeline.initial_state(intent).with_references(references);
    let state = orchestrator.run(state).await;

    for entry in &state.history {
        match entry {
            HistoryEntry::ExecutionFailed { iteration, errors } => {
                println!("  {} {} {}", format!("#{}", iteration + 1).bold(), "failed:".red(), errors.join("; "));
            }
            HistoryEntry::Evaluated { iteration, report } => {
                println!("  {} {}", format!("#{}", iteration + 1).bold(), report.summary());
            }
        }
    }

    let verdict = if state.satisfied { "satisfied".green() } else { "not satisfied".yellow() };
    println!(
        "{} {:.1}% ({}), {} of {} iteration(s)",
        "Final quality:".green(),
        state.quality_score * 100.0,
        verdict,
        state.history.len(),
        state.max_iterations
    );
    Ok(())
}

async fn handle_check_model_command(model: Option<&str>, config: &Config) -> Result<()> {
    let model = connect_model(model, config).await?;
    println!("{} {}", "Model available:".green(), model.name());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.apply_process_env();

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
