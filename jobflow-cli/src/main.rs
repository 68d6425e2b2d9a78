//! Command-line front end for the jobflow pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jobflow::checkpoint::{CheckpointKind, CheckpointStore, CsvCheckpointStore};
use jobflow::config::{AppConfig, DEFAULT_CONFIG_PATH};
use jobflow::core::{PipelineState, RunStatus};
use jobflow::events::LoggingEventSink;
use jobflow::observability::{init_tracing, LogFormat};
use jobflow::pipeline::{application_pipeline, Collaborators, RunManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search, parse the resume, write letters and render the PDF
    Run {
        /// Resume file, overriding `resume.file`
        #[arg(short, long)]
        resume_file: Option<PathBuf>,

        /// Delete existing checkpoints before starting
        #[arg(long)]
        fresh: bool,

        /// Log pipeline events with their full payload
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show the checkpoints in the workspace
    Checkpoints,
    /// Delete the checkpoints in the workspace
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(LogFormat::from_json_flag(cli.json_logs))?;

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = CsvCheckpointStore::new(&config.output.workspace);

    match cli.command {
        Command::Run {
            resume_file,
            fresh,
            verbose,
        } => {
            if let Some(file) = resume_file {
                config.resume.file = file;
            }
            if fresh {
                store.clear_all()?;
                info!("Checkpoints cleared");
            }
            let sink = if verbose {
                LoggingEventSink::debug()
            } else {
                LoggingEventSink::default()
            };
            run(&config, sink).await
        }
        Command::Checkpoints => show_checkpoints(&store),
        Command::Clean => {
            store.clear_all()?;
            println!("Cleared checkpoints in {}", store.dir().display());
            Ok(())
        }
    }
}

async fn run(config: &AppConfig, sink: LoggingEventSink) -> Result<()> {
    let collaborators = Collaborators::from_config(config)?;
    let pipeline = application_pipeline(config, &collaborators, Arc::new(sink))?;

    let mut state = PipelineState::from_config(config);
    if config.pipeline.resume_from_checkpoints {
        state.resume_from(collaborators.checkpoints.as_ref())?;
    }

    let manager = RunManager::new();
    let handle = manager.start(&config.output.workspace, Arc::new(pipeline), state)?;

    let canceller = manager.clone();
    let cancel_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            let _ = canceller.cancel(&cancel_handle, "Interrupted by user");
        }
    });

    let run = manager.wait(&handle).await?;
    for record in &run.records {
        info!(
            stage = %record.name,
            outcome = %record.outcome,
            duration_ms = record.duration.as_millis(),
            "Stage finished"
        );
    }

    match run.status {
        RunStatus::Completed { output } => {
            match output {
                Some(path) => println!("Completed: {}", path.display()),
                None => println!("Completed"),
            }
            Ok(())
        }
        RunStatus::Failed { reason } => bail!("Pipeline failed: {reason}"),
        other => bail!("Run ended in unexpected state: {other}"),
    }
}

fn show_checkpoints(store: &CsvCheckpointStore) -> Result<()> {
    for kind in CheckpointKind::ALL {
        let rows = store.load(kind)?.map_or(0, |records| records.len());
        let location = store
            .location(kind)
            .map_or_else(|| "-".to_string(), |p| p.display().to_string());
        println!("{:<14} {rows:>5} rows  {location}", kind.to_string());
    }
    Ok(())
}
