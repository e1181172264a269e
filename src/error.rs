use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::Split;

/// Fatal errors that abort a curation run.
#[derive(Debug, Error)]
pub enum CurationError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A source table is missing, unreadable or malformed.
    #[error("data load failed for {split} ({path}): {source:#}")]
    DataLoad {
        split: Split,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The structure-loading capability cannot be used at all.
    #[error("structure source unusable: {0}")]
    StructureSource(String),

    #[error("could not start worker pool: {0}")]
    WorkerPool(String),

    /// The manifest could not be written. The rows are handed back so the
    /// caller can retry with another destination.
    #[error("could not persist manifest to {path}: {source:#}")]
    Persist {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
        manifest: Box<crate::manifest::Manifest>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A predicate could not be evaluated for one candidate. Never fatal: the
/// candidate is treated as filtered out.
#[derive(Debug, Error)]
pub enum FilterEvaluationError {
    #[error("{field} is missing")]
    MissingField { field: &'static str },

    #[error("structures unavailable: {0}")]
    Structures(#[from] StructureLoadError),

    #[error("{what} has no comparable atoms")]
    NoCommonAtoms { what: &'static str },
}

/// The structure-loading capability failed for a single candidate.
#[derive(Debug, Error)]
pub enum StructureLoadError {
    #[error("no structures found for {id} under {path}")]
    NotFound { id: String, path: PathBuf },

    #[error("native {side} substructure missing for {id}")]
    MissingNative { id: String, side: &'static str },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PDB {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complex assembly or writing failed for one candidate.
#[derive(Debug, Error)]
pub enum StructureAssemblyError {
    #[error("{side} is empty after pruning")]
    EmptySide { side: &'static str },

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] StructureLoadError),
}

pub type Result<T, E = CurationError> = std::result::Result<T, E>;
