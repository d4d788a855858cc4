// SPDX-License-Identifier: MIT OR Apache-2.0
//! `graphplan` - export node graphs as execution plans.
//!
//! Commands:
//! - `export`: compile a graph and save the workflow with the plan embedded
//!   under `extra.api`
//! - `api`: compile a graph and print only the plan
//! - `init`: write a settings file with defaults

mod export;
mod settings;

use clap::{Parser, Subcommand};
use export::ExportError;
use settings::{ExportSettings, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graphplan", author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a graph and save the workflow with its plan
    Export {
        /// Graph file (.json or .ron)
        graph: PathBuf,

        /// Output file; asks for one when omitted and prompting is enabled
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compile a graph and print the plan to stdout
    Api {
        /// Graph file (.json or .ron)
        graph: PathBuf,
    },
    /// Write a settings file with default values
    Init,
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("graphplan_export=info,graphplan_graph=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Export failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ExportError> {
    let settings = ExportSettings::load_or_default(&cli.settings)?;

    match cli.command {
        Command::Export { graph, output } => {
            let Some(output) = output_path(output, &settings).await? else {
                tracing::info!("Export cancelled");
                return Ok(());
            };
            export::export_workflow(&graph, &output, &settings).await?;
        }
        Command::Api { graph } => {
            let mut loaded = export::load_graph(&graph).await?;
            let compiled = export::compile_graph(&mut loaded, &settings).await?;
            println!("{}", serde_json::to_string_pretty(&compiled.output)?);
        }
        Command::Init => {
            ExportSettings::default().save(&cli.settings)?;
            tracing::info!("Wrote default settings to {}", cli.settings.display());
        }
    }
    Ok(())
}

/// Output file from the command line, the prompt or the settings
async fn output_path(explicit: Option<PathBuf>, settings: &ExportSettings) -> Result<Option<PathBuf>, ExportError> {
    if let Some(path) = explicit {
        return Ok(Some(with_json_extension(&path)));
    }
    if !settings.prompt_filename {
        return Ok(export::normalize_filename(&settings.default_filename).map(PathBuf::from));
    }

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stderr = tokio::io::stderr();
    let name = export::prompt_filename(&settings.default_filename, &mut stdin, &mut stderr).await?;
    Ok(name.map(PathBuf::from))
}

fn with_json_extension(path: &Path) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()).and_then(export::normalize_filename) {
        Some(name) => path.with_file_name(name),
        None => path.to_path_buf(),
    }
}
