//! Curates a training set of two-chain protein complexes: joins the
//! per-split candidate index with its metadata, filters candidates on
//! table-level bounds and structural checks, keeps the best K per sequence
//! cluster, then writes native and predicted complexes in parallel and
//! records every outcome in a manifest.

pub mod config;
pub mod data;
pub mod error;
pub mod filters;
pub mod manifest;
pub mod materialize;
pub mod pipeline;
pub mod select;
pub mod structure;

pub use config::CurationConfig;
pub use error::{CurationError, Result};
pub use pipeline::{CurationPipeline, RunSummary};
