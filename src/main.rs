//! Command-line entry point for a curation run.
//!
//! ```bash
//! complex-curator --config curate.toml --data-root data --output-root curated_data
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use complex_curator::config::TableFormat;
use complex_curator::data::model::Split;
use complex_curator::{CurationConfig, CurationError, CurationPipeline};

#[derive(Parser, Debug)]
#[command(name = "complex-curator")]
#[command(about = "Filter, cluster-cap and materialize protein complexes into a curated dataset")]
struct Args {
    /// TOML config file. Flags below override its values.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory holding <split>/index.* and <split>/metadata.*
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Directory holding <id>/native_receptor.pdb and friends
    #[arg(long)]
    structure_root: Option<PathBuf>,

    /// Where complexes and the manifest are written
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Splits to process (default: train, val, test)
    #[arg(long, num_args = 1..)]
    splits: Vec<Split>,

    /// Candidates kept per sequence cluster
    #[arg(long, short = 'k')]
    max_per_cluster: Option<usize>,

    /// Number of materialization workers
    #[arg(long, short = 'j')]
    workers: Option<usize>,

    #[arg(long, value_enum)]
    manifest_format: Option<TableFormat>,

    /// Apply only the table-level bounds
    #[arg(long)]
    no_structural_filters: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn into_config(self) -> Result<CurationConfig> {
        let mut config = match &self.config {
            Some(path) => CurationConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => CurationConfig::default(),
        };
        if let Some(root) = self.data_root {
            config.paths.data_root = root;
        }
        if let Some(root) = self.structure_root {
            config.paths.structure_root = root;
        }
        if let Some(root) = self.output_root {
            config.paths.output_root = root;
        }
        if !self.splits.is_empty() {
            config.paths.splits = self.splits;
        }
        if let Some(k) = self.max_per_cluster {
            config.selection.max_per_cluster = k;
        }
        if let Some(width) = self.workers {
            config.workers.width = width;
        }
        if let Some(format) = self.manifest_format {
            config.paths.manifest_format = format;
        }
        if self.no_structural_filters {
            config.filters.structural = false;
        }
        if self.no_progress {
            config.workers.progress = false;
        }
        Ok(config)
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let pipeline = CurationPipeline::from_config(config)?;
    let summary = match pipeline.run() {
        Ok(summary) => summary,
        Err(CurationError::Persist {
            path,
            source,
            manifest,
        }) => {
            // Keep the results on stdout so a failed write loses nothing.
            log::error!("could not write {}: {source:#}; dumping rows", path.display());
            for row in &manifest.rows {
                println!("{}", serde_json::to_string(row)?);
            }
            anyhow::bail!("manifest not persisted");
        }
        Err(e) => return Err(e.into()),
    };

    for (split, count) in &summary.selected {
        log::info!("{split}: {count} selected");
    }
    log::info!("manifest: {}", summary.manifest_path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
