use crate::config::Config;
use crate::dataset::Dataset;
use crate::graphs::GraphGenerator;
use crate::summary::ErrorSummarizer;
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use glob::glob;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Rendering of a summary report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

pub struct Manager {
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let cfg = match config_file {
            Some(file) => Config::from_file(file).context("failed to construct cfg")?,
            None => Config::default(),
        };
        log::info!("{cfg:#?}");

        Ok(Self { cfg })
    }

    pub fn cfg_mut(&mut self) -> &mut Config {
        &mut self.cfg
    }

    /// Summarize every file matching `pattern`.
    ///
    /// Text reports are printed one after another; JSON output is a single
    /// array holding one report per file.
    pub fn summarize(&self, pattern: &str, format: Format) -> Result<()> {
        let summarizer =
            ErrorSummarizer::new(self.cfg.summary.clone(), self.cfg.vocabulary.clone());

        let mut reports = Vec::new();
        for file in self.resolve_inputs(pattern).context("failed to resolve inputs")? {
            let dataset =
                Dataset::from_file(&file).with_context(|| format!("failed to load {file:?}"))?;
            log::info!("loaded {} records from {file:?}", dataset.len());

            let source = file_label(&file);
            let report = summarizer
                .summarize(&source, &dataset)
                .with_context(|| format!("failed to summarize {file:?}"))?;
            reports.push(report);
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        match format {
            Format::Text => {
                for report in &reports {
                    writeln!(out, "{report}")?;
                }
            }
            Format::Json => {
                serde_json::to_writer_pretty(&mut out, &reports)
                    .context("failed to serialize reports")?;
                writeln!(out)?;
            }
        }
        out.flush().context("failed to flush stdout")?;

        Ok(())
    }

    pub fn generate_graphs(&self, pattern: &str, out_dir: &Path) -> Result<()> {
        self.cfg.validate().context("invalid graph parameters")?;

        let inputs = self.resolve_inputs(pattern).context("failed to resolve inputs")?;
        let generator = GraphGenerator::new(self.cfg.graphs.clone());

        let mut saved = Vec::new();
        for file in &inputs {
            let file_out_dir = if inputs.len() == 1 {
                out_dir.to_path_buf()
            } else {
                out_dir.join(graphs_dir_name(file))
            };
            let paths = generator
                .generate(file, &file_out_dir)
                .with_context(|| format!("failed to generate graphs for {file:?}"))?;
            saved.extend(paths);
        }

        println!("Saved:");
        for path in &saved {
            println!(" - {}", path.display());
        }

        Ok(())
    }

    fn resolve_inputs(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("invalid pattern {pattern:?}"))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if files.is_empty() {
            bail!("no file matches {pattern:?}");
        }
        files.sort();
        Ok(files)
    }
}

fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

/// `results_accupedo.csv` -> `accupedo_graphs`.
fn graphs_dir_name(file: &Path) -> String {
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = stem.strip_prefix("results_").unwrap_or(&stem);
    format!("{name}_graphs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphs_dir_strips_results_prefix() {
        assert_eq!(graphs_dir_name(Path::new("data/results_accupedo.csv")), "accupedo_graphs");
        assert_eq!(graphs_dir_name(Path::new("walklogger.csv")), "walklogger_graphs");
    }

    #[test]
    fn file_label_is_file_name() {
        assert_eq!(file_label(Path::new("/tmp/run/verification.csv")), "verification.csv");
    }
}
