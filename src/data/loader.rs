use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    StringArray, UInt32Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{CellValue, RawTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – as written by Pandas or Polars
/// * `.csv`             – header row with column names
pub fn read_table(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => read_parquet(path),
        "csv" => read_csv(path),
        other => bail!("Unsupported table extension: .{other}"),
    }
}

/// Left join `right` onto `left` by `key`.
///
/// Every row of `left` is kept. Right-hand columns are null where no match
/// exists. A right-hand column whose name already exists on the left is
/// ignored. Keys must be non-null and unique on both sides.
pub fn left_join(left: &RawTable, right: &RawTable, key: &str) -> Result<RawTable> {
    if !left.has_column(key) {
        bail!("left table has no '{key}' column");
    }
    if !right.has_column(key) {
        bail!("right table has no '{key}' column");
    }

    let mut right_by_key: HashMap<String, &BTreeMap<String, CellValue>> =
        HashMap::with_capacity(right.len());
    for (row_no, row) in right.rows.iter().enumerate() {
        let k = key_of(row, key).with_context(|| format!("right row {row_no}"))?;
        if right_by_key.insert(k.clone(), row).is_some() {
            bail!("duplicate '{key}' value '{k}' in right table");
        }
    }

    let extra: Vec<&String> = right
        .columns
        .iter()
        .filter(|c| !left.has_column(c))
        .collect();
    let mut columns = left.columns.clone();
    columns.extend(extra.iter().map(|c| (*c).clone()));

    let mut seen = HashMap::with_capacity(left.len());
    let mut rows = Vec::with_capacity(left.len());
    for (row_no, row) in left.rows.iter().enumerate() {
        let k = key_of(row, key).with_context(|| format!("left row {row_no}"))?;
        if let Some(first) = seen.insert(k.clone(), row_no) {
            bail!("duplicate '{key}' value '{k}' in left table (rows {first} and {row_no})");
        }
        let mut joined = row.clone();
        let matched = right_by_key.get(&k);
        for col in &extra {
            let value = matched
                .and_then(|r| r.get(*col))
                .cloned()
                .unwrap_or(CellValue::Null);
            joined.insert((*col).clone(), value);
        }
        rows.push(joined);
    }

    Ok(RawTable { columns, rows })
}

fn key_of(row: &BTreeMap<String, CellValue>, key: &str) -> Result<String> {
    row.get(key)
        .and_then(CellValue::as_text)
        .with_context(|| format!("null '{key}'"))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = columns
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), csv_cell(value)))
            .collect();
        rows.push(row);
    }

    Ok(RawTable { columns, rows })
}

/// CSV cells keep their raw text; numeric columns are parsed where they are
/// typed, so identifiers like `007` or `1e10` survive unchanged.
fn csv_cell(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Null
    } else {
        CellValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

fn read_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = columns
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.clone(), extract_cell(batch.column(idx), row)))
                .collect();
            rows.push(cells);
        }
    }

    Ok(RawTable { columns, rows })
}

/// Extract a single scalar from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => CellValue::String(s.value(row).to_string()),
            None => unsupported(col),
        },
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int16 => any
            .downcast_ref::<Int16Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Integer(a.value(row) as i64)),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Integer(a.value(row) as i64)),
        DataType::UInt32 => any
            .downcast_ref::<UInt32Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or_else(|| unsupported(col), |a| CellValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or_else(|| unsupported(col), |a| CellValue::Bool(a.value(row))),
        _ => unsupported(col),
    }
}

fn unsupported(col: &Arc<dyn Array>) -> CellValue {
    CellValue::Unsupported(format!("{:?}", col.data_type()))
}
