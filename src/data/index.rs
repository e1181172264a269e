use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use super::loader::{left_join, read_table};
use super::model::{CandidateRecord, CellValue, DomainSet, RawTable, Split};
use crate::error::CurationError;

/// Join key shared by the index and metadata tables.
pub const ID_COLUMN: &str = "id";

/// Columns the primary index must provide.
pub const INDEX_COLUMNS: [&str; 12] = [
    "id",
    "cluster_id",
    "cluster_id_L",
    "cluster_id_R",
    "length1",
    "length2",
    "uniprot_L",
    "uniprot_R",
    "ECOD_names_L",
    "ECOD_names_R",
    "label",
    "method",
];

const TABLE_EXTENSIONS: [&str; 3] = ["parquet", "pq", "csv"];

/// The joined candidate table of one split.
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    pub split: Split,
    pub records: Vec<CandidateRecord>,
}

impl CandidateIndex {
    /// Load `<data_root>/<split>/index.*` and `<data_root>/<split>/metadata.*`.
    pub fn load_split(data_root: &Path, split: Split) -> Result<Self, CurationError> {
        let dir = data_root.join(split.as_str());
        let index_path = find_table(&dir, "index").map_err(|source| CurationError::DataLoad {
            split,
            path: dir.join("index"),
            source,
        })?;
        let metadata_path =
            find_table(&dir, "metadata").map_err(|source| CurationError::DataLoad {
                split,
                path: dir.join("metadata"),
                source,
            })?;
        Self::load(split, &index_path, &metadata_path)
    }

    /// Load and left-join an index table and a metadata table.
    pub fn load(split: Split, index_path: &Path, metadata_path: &Path) -> Result<Self, CurationError> {
        let data_load = |path: &Path| {
            let path = path.to_path_buf();
            move |source: anyhow::Error| CurationError::DataLoad { split, path, source }
        };

        let index = read_table(index_path)
            .context("reading primary index")
            .map_err(data_load(index_path))?;
        let metadata = read_table(metadata_path)
            .context("reading metadata")
            .map_err(data_load(metadata_path))?;
        let index = Self::from_tables(split, &index, &metadata).map_err(data_load(index_path))?;

        log::info!(
            "{split}: loaded {} candidates from {:?} (+ {} metadata rows)",
            index.records.len(),
            index_path,
            metadata.len()
        );
        Ok(index)
    }

    /// Join already-read tables and convert rows into typed records.
    pub fn from_tables(split: Split, index: &RawTable, metadata: &RawTable) -> Result<Self> {
        for col in INDEX_COLUMNS {
            if !index.has_column(col) {
                bail!("primary index is missing column '{col}'");
            }
        }
        if !metadata.has_column("resolution") {
            bail!("metadata is missing column 'resolution'");
        }

        let joined = left_join(index, metadata, ID_COLUMN)?;
        let records = joined
            .rows
            .iter()
            .enumerate()
            .map(|(row_no, row)| to_record(row).with_context(|| format!("joined row {row_no}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(CandidateIndex { split, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn find_table(dir: &Path, stem: &str) -> Result<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
        .ok_or_else(|| anyhow!("no {stem}.{{parquet,pq,csv}} in {}", dir.display()))
}

fn to_record(row: &BTreeMap<String, CellValue>) -> Result<CandidateRecord> {
    let id = text(row, "id")?.context("null id")?;
    let length1 = length(row, "length1")?;
    let length2 = length(row, "length2")?;
    let total = match (length1, length2) {
        (Some(a), Some(b)) => Some(
            a.checked_add(b)
                .with_context(|| format!("length1 + length2 ({a} + {b}) overflows"))?,
        ),
        _ => None,
    };

    Ok(CandidateRecord {
        cluster_id: text(row, "cluster_id")?,
        cluster_id_l: text(row, "cluster_id_L")?,
        cluster_id_r: text(row, "cluster_id_R")?,
        length1,
        length2,
        length: total,
        resolution: resolution(row)?,
        method: text(row, "method")?,
        label: text(row, "label")?,
        uniprot_l: text(row, "uniprot_L")?,
        uniprot_r: text(row, "uniprot_R")?,
        ecod_names_l: text(row, "ECOD_names_L")?.map(|s| DomainSet::parse(&s)),
        ecod_names_r: text(row, "ECOD_names_R")?.map(|s| DomainSet::parse(&s)),
        id,
    })
}

fn cell<'a>(row: &'a BTreeMap<String, CellValue>, col: &str) -> &'a CellValue {
    row.get(col).unwrap_or(&CellValue::Null)
}

fn text(row: &BTreeMap<String, CellValue>, col: &str) -> Result<Option<String>> {
    match cell(row, col) {
        CellValue::Unsupported(t) => bail!("column '{col}' has unsupported type {t}"),
        other => Ok(other.as_text()),
    }
}

fn length(row: &BTreeMap<String, CellValue>, col: &str) -> Result<Option<u32>> {
    match cell(row, col) {
        CellValue::Null => Ok(None),
        CellValue::Integer(i) => u32::try_from(*i)
            .map(Some)
            .map_err(|_| anyhow!("'{col}' value {i} is not a valid length")),
        CellValue::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64 => {
            Ok(Some(*f as u32))
        }
        CellValue::String(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .with_context(|| format!("'{col}' value '{s}' is not a valid length")),
        other => bail!("'{col}' value {other} is not a valid length"),
    }
}

/// Resolution coerced to `f32` so ordering is stable across sources.
/// Non-numeric values are errors, never zero.
fn resolution(row: &BTreeMap<String, CellValue>) -> Result<Option<f32>> {
    let value = match cell(row, "resolution") {
        CellValue::Null => return Ok(None),
        CellValue::Integer(i) => *i as f32,
        CellValue::Float(f) => *f as f32,
        CellValue::String(s) => s
            .trim()
            .parse::<f32>()
            .with_context(|| format!("resolution '{s}' is not a number"))?,
        other => bail!("resolution value {other} is not a number"),
    };
    Ok(if value.is_nan() { None } else { Some(value) })
}
