use crate::{error::CliError, shutdown::ExitCode};
use clap::Parser;
use commands::Commands;
use connectors::{file::JsonFileSource, sink::SledSink};
use engine_core::state::{AuditLog, WatermarkStore, sled_store::SledStateStore};
use engine_runtime::{
    error::PipelineError, orchestrator::PipelineOrchestrator, settings::PipelineSettings,
};
use model::key::TableKey;
use std::{path::PathBuf, sync::Arc};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "tidemark",
    version = "0.1.0",
    about = "Watermark-gated incremental batch ingestion"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli.command).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run {
            input,
            source,
            table,
            hold_on_warn,
            state_dir,
            staging_dir,
            json,
        } => {
            run_batch(
                &input,
                &source,
                &table,
                hold_on_warn,
                state_dir,
                staging_dir,
                json,
            )
            .await
        }
        Commands::Watermark {
            source,
            table,
            state_dir,
            json,
        } => {
            let store = open_state_store(state_dir)?;
            let record = store.get(&TableKey::new(&source, &table)).await?;
            output::print_watermark(&record, json)
        }
        Commands::Audit {
            source,
            table,
            last,
            state_dir,
            json,
        } => {
            let store = open_state_store(state_dir)?;
            let mut entries = store.entries(&TableKey::new(&source, &table)).await?;
            if let Some(n) = last {
                let skip = entries.len().saturating_sub(n);
                entries.drain(..skip);
            }
            output::print_audit(&entries, json)
        }
    }
}

async fn run_batch(
    input: &str,
    source_system: &str,
    table: &str,
    hold_on_warn: bool,
    state_dir: Option<String>,
    staging_dir: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let state = open_state_store(state_dir)?;
    let staging = resolve_dir(staging_dir, "staging")?;
    let sink = SledSink::open(&staging).map_err(|err| CliError::StoreOpen {
        path: staging.display().to_string(),
        reason: err.to_string(),
    })?;
    let sink = Arc::new(sink);
    let source = Arc::new(JsonFileSource::new(input));

    let settings = PipelineSettings {
        advance_on_warn: !hold_on_warn,
        ..Default::default()
    };
    let orchestrator = PipelineOrchestrator::new(source, sink, state, settings);
    let cancel = shutdown::cancel_on_signal();

    let key = TableKey::new(source_system, table);
    match orchestrator.run_batch(&key, cancel).await {
        Ok(outcome) => output::print_outcome(&outcome, json),
        Err(PipelineError::ShutdownRequested) => Err(CliError::ShutdownRequested),
        Err(err) => Err(err.into()),
    }
}

fn open_state_store(state_dir: Option<String>) -> Result<Arc<SledStateStore>, CliError> {
    let path = resolve_dir(state_dir, "state")?;
    let store = SledStateStore::open(&path).map_err(|err| CliError::StoreOpen {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    Ok(Arc::new(store))
}

fn resolve_dir(explicit: Option<String>, purpose: &str) -> Result<PathBuf, CliError> {
    if let Some(dir) = explicit {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::DataDir("could not determine home directory".into()))?;
    Ok(home.join(".tidemark").join(purpose))
}
