//! Manifest aggregation and persistence.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::config::TableFormat;
use crate::error::CurationError;
use crate::materialize::TaskOutcome;

pub const COLUMNS: [&str; 6] = [
    "id",
    "native_output_id",
    "predicted_output_id",
    "split",
    "status",
    "error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    NativeOnly,
    NativeAndPredicted,
    Failed,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::NativeOnly => "native_only",
            RowStatus::NativeAndPredicted => "native_and_predicted",
            RowStatus::Failed => "failed",
        }
    }
}

/// One manifest line. Empty strings stand for absent values on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    pub id: String,
    pub native_output_id: String,
    pub predicted_output_id: String,
    pub split: String,
    pub status: RowStatus,
    pub error: String,
}

impl From<TaskOutcome> for ManifestRow {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::NativeOnly(row) => ManifestRow {
                id: row.id,
                native_output_id: row.native_output_id,
                predicted_output_id: String::new(),
                split: row.split.to_string(),
                status: RowStatus::NativeOnly,
                error: String::new(),
            },
            TaskOutcome::NativeAndPredicted(row) => ManifestRow {
                id: row.id,
                native_output_id: row.native_output_id,
                predicted_output_id: row.predicted_output_id.unwrap_or_default(),
                split: row.split.to_string(),
                status: RowStatus::NativeAndPredicted,
                error: String::new(),
            },
            TaskOutcome::Failed {
                id,
                split,
                native_output_id,
                error,
            } => ManifestRow {
                id,
                native_output_id: native_output_id.unwrap_or_default(),
                predicted_output_id: String::new(),
                split: split.to_string(),
                status: RowStatus::Failed,
                error,
            },
        }
    }
}

/// Every task's row, sorted by (split, id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Collect outcomes in any order. One row per outcome.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = TaskOutcome>) -> Self {
        let mut rows: Vec<ManifestRow> = outcomes.into_iter().map(ManifestRow::from).collect();
        rows.sort_by(|a, b| (&a.split, &a.id).cmp(&(&b.split, &b.id)));
        Manifest { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Write the manifest. On failure the error carries a copy of the rows.
    pub fn persist(&self, path: &Path, format: TableFormat) -> Result<(), CurationError> {
        let written = match format {
            TableFormat::Csv => self.write_csv(path),
            TableFormat::Parquet => self.write_parquet(path),
        };
        written.map_err(|source| CurationError::Persist {
            path: path.to_path_buf(),
            source,
            manifest: Box::new(self.clone()),
        })?;
        log::info!("wrote manifest with {} rows to {:?}", self.len(), path);
        Ok(())
    }

    fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
        if self.rows.is_empty() {
            writer.write_record(COLUMNS).context("writing CSV header")?;
        }
        for row in &self.rows {
            writer.serialize(row).context("writing CSV row")?;
        }
        writer.flush().context("flushing CSV")?;
        Ok(())
    }

    fn write_parquet(&self, path: &Path) -> Result<()> {
        let column = |f: fn(&ManifestRow) -> &str| -> ArrayRef {
            Arc::new(StringArray::from(self.rows.iter().map(f).collect::<Vec<_>>()))
        };
        let optional = |f: fn(&ManifestRow) -> &str| -> ArrayRef {
            Arc::new(StringArray::from(
                self.rows
                    .iter()
                    .map(|r| Some(f(r)).filter(|s| !s.is_empty()))
                    .collect::<Vec<_>>(),
            ))
        };

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("native_output_id", DataType::Utf8, true),
            Field::new("predicted_output_id", DataType::Utf8, true),
            Field::new("split", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("error", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                column(|r| r.id.as_str()),
                optional(|r| r.native_output_id.as_str()),
                optional(|r| r.predicted_output_id.as_str()),
                column(|r| r.split.as_str()),
                column(|r| r.status.as_str()),
                optional(|r| r.error.as_str()),
            ],
        )
        .context("building record batch")?;

        let file = File::create(path).context("creating parquet file")?;
        let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
        writer.write(&batch).context("writing parquet batch")?;
        writer.close().context("closing parquet writer")?;
        Ok(())
    }
}
