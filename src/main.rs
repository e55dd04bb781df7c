mod config;
mod dataset;
mod error;
mod graphs;
mod manager;
mod stats;
mod summary;
mod tags;

use crate::manager::{Format, Manager};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML configuration file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize absolute errors with and without outliers.
    Summarize {
        /// Input CSV file or glob pattern.
        #[arg(long, default_value = "verification.csv")]
        input: String,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Draw step and error boxplots of a results table.
    Graphs {
        /// Input CSV file or glob pattern.
        #[arg(long)]
        input: String,

        #[arg(long, default_value = "graphs")]
        out_dir: PathBuf,

        /// Ground-truth step count, overriding the configuration.
        #[arg(long)]
        truth: Option<f64>,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut mgr = Manager::new(args.config.as_ref()).context("failed to construct mgr")?;

    match args.command {
        Command::Summarize { input, format } => mgr.summarize(&input, format)?,
        Command::Graphs {
            input,
            out_dir,
            truth,
        } => {
            if let Some(truth) = truth {
                mgr.cfg_mut().graphs.truth = truth;
            }
            mgr.generate_graphs(&input, &out_dir)?
        }
    }

    Ok(())
}
