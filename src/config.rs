//! Run configuration.
//!
//! Every threshold the curation run uses lives here with its default; nothing
//! downstream hard-codes a bound. A config file is TOML, every section and key
//! optional:
//!
//! ```toml
//! [selection]
//! max_per_cluster = 2
//! max_length = 1024
//!
//! [filters]
//! rmsd_cutoff = 7.5
//!
//! [workers]
//! width = 20
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::model::Split;
use crate::error::{CurationError, Result};

/// Root configuration for a curation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub selection: SelectionConfig,
    pub filters: FilterConfig,
    pub workers: WorkerConfig,
    pub paths: PathConfig,
}

/// Row-level bounds and cluster cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Maximum candidates kept per cluster and split.
    pub max_per_cluster: usize,
    /// Maximum combined length of both monomers.
    pub max_length: u32,
    /// Maximum length of either monomer.
    pub max_length_per_monomer: u32,
    /// Minimum length of either monomer.
    pub min_length_per_monomer: u32,
    /// Required assembly label.
    pub label: String,
    /// Required structure determination method.
    pub method: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_per_cluster: 2,
            max_length: 1024,
            max_length_per_monomer: 512,
            min_length_per_monomer: 50,
            label: "BIO".to_string(),
            method: "X-RAY DIFFRACTION".to_string(),
        }
    }
}

/// Thresholds for the structural predicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Evaluate structural predicates at all. Off means table bounds only.
    pub structural: bool,
    pub min_contacts: usize,
    /// Ångström.
    pub contact_radius: f64,
    /// Count contacts on CA atoms only.
    pub calpha_only: bool,
    /// Ångström; used for both native and sub-entity connectivity checks.
    pub detached_radius: f64,
    pub max_components: usize,
    pub min_atom_types: usize,
    /// Residues shared with the native monomer.
    pub min_overlap: usize,
    pub min_sequence_identity: f64,
    /// Ångström.
    pub rmsd_cutoff: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            structural: true,
            min_contacts: 5,
            contact_radius: 10.0,
            calpha_only: true,
            detached_radius: 12.0,
            max_components: 2,
            min_atom_types: 4,
            min_overlap: 5,
            min_sequence_identity: 0.8,
            rmsd_cutoff: 7.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of parallel materialization workers.
    pub width: usize,
    pub progress: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            width: 20,
            progress: true,
        }
    }
}

/// Manifest file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Holds `<split>/index.{parquet,csv}` and `<split>/metadata.{parquet,csv}`.
    pub data_root: PathBuf,
    /// Holds `<id>/native_receptor.pdb` and friends.
    pub structure_root: PathBuf,
    pub output_root: PathBuf,
    pub manifest_format: TableFormat,
    pub splits: Vec<Split>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            structure_root: PathBuf::from("data/structures"),
            output_root: PathBuf::from("curated_data"),
            manifest_format: TableFormat::Csv,
            splits: Split::ALL.to_vec(),
        }
    }
}

impl CurationConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CurationError::Config(e.to_string()))
    }

    /// Reject bounds that would make every candidate fail or the pool unusable.
    pub fn validate(&self) -> Result<()> {
        let s = &self.selection;
        if s.max_per_cluster == 0 {
            return Err(CurationError::Config("max_per_cluster must be at least 1".into()));
        }
        if s.min_length_per_monomer > s.max_length_per_monomer {
            return Err(CurationError::Config(format!(
                "min_length_per_monomer ({}) exceeds max_length_per_monomer ({})",
                s.min_length_per_monomer, s.max_length_per_monomer
            )));
        }
        if self.workers.width == 0 {
            return Err(CurationError::Config("worker width must be at least 1".into()));
        }
        let f = &self.filters;
        if !(0.0..=1.0).contains(&f.min_sequence_identity) {
            return Err(CurationError::Config(format!(
                "min_sequence_identity must be within [0, 1], got {}",
                f.min_sequence_identity
            )));
        }
        if f.contact_radius <= 0.0 || f.detached_radius <= 0.0 || f.rmsd_cutoff < 0.0 {
            return Err(CurationError::Config(
                "radii must be positive and rmsd_cutoff non-negative".into(),
            ));
        }
        if self.paths.splits.is_empty() {
            return Err(CurationError::Config("no splits configured".into()));
        }
        Ok(())
    }

    /// `<output_root>/manifest.<fmt>`
    pub fn manifest_path(&self) -> PathBuf {
        self.paths
            .output_root
            .join(format!("manifest.{}", self.paths.manifest_format.extension()))
    }
}
