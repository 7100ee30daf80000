use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray, ListArray,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{
    INDEX, INDEX_ABSOLUTE, INDEX_COLUMNS, INDEX_WINDOW, InMemoryStore, LabelTable, SleepStage,
};
use crate::error::AccessError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a windowed-signal store from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – integer `index*` columns plus one List<Float> column per feature (recommended)
/// * `.json`    – `[{ "index": 1, "index_absolute": 0, "index_window": 0, "eeg": [...] }, ...]`
/// * `.csv`     – integer `index*` columns, features as semicolon-separated floats
pub fn load_store(path: &Path) -> Result<InMemoryStore> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let rows = columns.index.len();
    let n_features = columns.features.len();
    let store = columns.finish()?;
    log::info!(
        "loaded {} ({rows} windows, {n_features} features)",
        path.display()
    );
    Ok(store)
}

/// Load sleep-stage labels from a CSV with header `index,sleep_stage`.
pub fn load_labels(path: &Path) -> Result<LabelTable> {
    #[derive(Deserialize)]
    struct LabelRecord {
        index: usize,
        sleep_stage: SleepStage,
    }

    let mut reader = csv::Reader::from_path(path).context("opening label CSV")?;
    let labels = reader
        .deserialize::<LabelRecord>()
        .enumerate()
        .map(|(row_no, result)| {
            let rec = result.with_context(|| format!("label CSV row {row_no}"))?;
            Ok((rec.index, rec.sleep_stage))
        })
        .collect::<Result<LabelTable>>()?;

    log::info!("loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

// ---------------------------------------------------------------------------
// Column accumulator shared by all formats
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Columns {
    index: Vec<i64>,
    index_absolute: Vec<i64>,
    index_window: Vec<i64>,
    features: BTreeMap<String, Vec<Vec<f64>>>,
}

impl Columns {
    fn push_index(&mut self, name: &str, value: i64) {
        match name {
            INDEX => self.index.push(value),
            INDEX_ABSOLUTE => self.index_absolute.push(value),
            INDEX_WINDOW => self.index_window.push(value),
            _ => {}
        }
    }

    fn push_block(&mut self, name: &str, block: Vec<f64>) {
        self.features.entry(name.to_string()).or_default().push(block);
    }

    fn finish(self) -> Result<InMemoryStore> {
        let mut store = InMemoryStore::new(self.index, self.index_absolute, self.index_window)?;
        for (name, blocks) in self.features {
            store = store.with_feature(name, blocks)?;
        }
        Ok(store)
    }
}

fn require_index_columns(present: &[&str]) -> Result<()> {
    for required in INDEX_COLUMNS {
        if !present.contains(&required) {
            return Err(AccessError::MissingColumn(required.to_string()).into());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "index": 1, "index_absolute": 0, "index_window": 0, "eeg": [0.1, 0.2, ...] },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Columns> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns = Columns::default();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        require_index_columns(&keys).with_context(|| format!("Row {i}"))?;

        for (key, val) in obj {
            if INDEX_COLUMNS.contains(&key.as_str()) {
                let v = val
                    .as_i64()
                    .with_context(|| format!("Row {i}: '{key}' is not an integer"))?;
                columns.push_index(key, v);
            } else {
                columns.push_block(key, json_array_to_f64(val, i, key)?);
            }
        }
    }

    Ok(columns)
}

fn json_array_to_f64(val: &JsonValue, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .as_array()
        .with_context(|| format!("Row {row}: '{col}' is not an array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// `index`, `index_absolute` and `index_window` hold integers; every other
/// column holds one window of samples as semicolon-separated floats:
///   `"0.12;0.14;0.11"`
fn load_csv(path: &Path) -> Result<Columns> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let names: Vec<&str> = headers.iter().map(String::as_str).collect();
    require_index_columns(&names)?;

    let mut columns = Columns::default();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        for (col_idx, value) in record.iter().enumerate() {
            let col_name = &headers[col_idx];
            if INDEX_COLUMNS.contains(&col_name.as_str()) {
                let v = value.trim().parse::<i64>().with_context(|| {
                    format!("CSV row {row_no}, '{col_name}': '{value}' is not an integer")
                })?;
                columns.push_index(col_name, v);
            } else {
                columns.push_block(col_name, parse_semicolon_floats(value, row_no, col_name)?);
            }
        }
    }

    Ok(columns)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing windowed signals.
///
/// Expected schema:
/// - `index`, `index_absolute`, `index_window`: Int32 / Int64 / UInt32 / UInt64
/// - every List<Float64|Float32> or LargeList<…> column is a feature
/// - any other column is ignored
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Columns> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns = Columns::default();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        require_index_columns(&names)?;

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let name = field.name();
            let col = batch.column(col_idx);

            if INDEX_COLUMNS.contains(&name.as_str()) {
                for row in 0..n_rows {
                    let v = extract_i64(col, row)
                        .with_context(|| format!("Row {row}: failed to read '{name}'"))?;
                    columns.push_index(name, v);
                }
            } else if matches!(field.data_type(), DataType::List(_) | DataType::LargeList(_)) {
                for row in 0..n_rows {
                    let block = extract_f64_list(col, row)
                        .with_context(|| format!("Row {row}: failed to read '{name}'"))?;
                    columns.push_block(name, block);
                }
            } else {
                log::debug!("skipping non-list column '{name}' ({:?})", field.data_type());
            }
        }
    }

    Ok(columns)
}

// -- Parquet / Arrow helpers --

/// Extract an integer cell, widening to `i64`.
fn extract_i64(col: &Arc<dyn Array>, row: usize) -> Result<i64> {
    if col.is_null(row) {
        bail!("null value in integer column");
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(arr.value(row) as i64)
    } else if let Some(arr) = any.downcast_ref::<UInt32Array>() {
        Ok(arr.value(row) as i64)
    } else if let Some(arr) = any.downcast_ref::<UInt64Array>() {
        i64::try_from(arr.value(row)).context("value does not fit in i64")
    } else {
        bail!("Expected an integer column, got {:?}", col.data_type())
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::WindowStore;
    use std::io::Write;

    #[test]
    fn csv_store_parses_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "index,index_absolute,index_window,pulse").unwrap();
        writeln!(f, "1,0,0,0.5;0.25").unwrap();
        writeln!(f, "1,1,1,1.5;1.25").unwrap();
        drop(f);

        let store = load_store(&path).unwrap();
        assert_eq!(store.num_rows(), 2);
        assert_eq!(
            store.feature_blocks("pulse", 0..2).unwrap(),
            vec![vec![0.5, 0.25], vec![1.5, 1.25]]
        );
        assert_eq!(store.window_index(0..2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn json_store_requires_index_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"[{"index": 1, "index_window": 0, "x": [1.0]}]"#).unwrap();

        let err = load_store(&path).unwrap_err();
        assert!(format!("{err:#}").contains("index_absolute"));
    }

    #[test]
    fn json_store_parses_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"[
                {"index": 4, "index_absolute": 10, "index_window": 0, "x": [1.0, 2.0]},
                {"index": 4, "index_absolute": 11, "index_window": 1, "x": [3.0, 4.0]}
            ]"#,
        )
        .unwrap();

        let store = load_store(&path).unwrap();
        assert_eq!(store.absolute_index().unwrap().as_ref(), &[10, 11]);
        assert_eq!(store.feature_names(), vec!["x".to_string()]);
    }

    #[test]
    fn unsupported_extension() {
        assert!(load_store(Path::new("store.h5")).is_err());
    }

    #[test]
    fn labels_reject_unknown_stage() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("y.csv");
        std::fs::write(&good, "index,sleep_stage\n0,0\n1,2\n2,4\n").unwrap();
        let labels = load_labels(&good).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(2), Some(SleepStage::Rem));

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "index,sleep_stage\n0,9\n").unwrap();
        assert!(load_labels(&bad).is_err());
    }
}
