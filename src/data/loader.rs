use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::frame::{Frame, Record, Value};

// ---------------------------------------------------------------------------
// CSV dialects
// ---------------------------------------------------------------------------

/// Field delimiter and decimal mark of a delimited file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub decimal_comma: bool,
}

impl CsvDialect {
    /// The primary dataset export: `;` separated, `,` as decimal mark.
    pub const PRIMARY: CsvDialect = CsvDialect {
        delimiter: b';',
        decimal_comma: true,
    };

    /// Splits, metrics and outputs: plain comma separated values.
    pub const STANDARD: CsvDialect = CsvDialect {
        delimiter: b',',
        decimal_comma: false,
    };
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a frame from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – dialect sniffed from the header line
/// * `.json`         – `[{ "Crop": "Rice", "Rainfall_mm": 812.5, ... }, ...]`
/// * `.parquet`      – any flat schema of string / numeric / boolean columns
pub fn load_file(path: &Path) -> Result<Frame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => {
            let dialect = sniff_dialect(path)?;
            load_csv(path, dialect)
        }
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Guess the dialect from the header line: a `;` in the header means the
/// primary export format, anything else is standard CSV.
pub fn sniff_dialect(path: &Path) -> Result<CsvDialect> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .context("reading CSV header line")?;

    if header.contains(';') {
        Ok(CsvDialect::PRIMARY)
    } else {
        Ok(CsvDialect::STANDARD)
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load a delimited file with a header row. Cell types are guessed per cell.
pub fn load_csv(path: &Path, dialect: CsvDialect) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        bail!("CSV {} has no header row", path.display());
    }

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;

        if row.len() != headers.len() {
            bail!(
                "CSV row {row_no}: expected {} fields but found {}",
                headers.len(),
                row.len()
            );
        }

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(h, cell)| (h.clone(), parse_cell(cell, dialect)))
            .collect();
        records.push(record);
    }

    log::debug!(
        "Loaded {} rows x {} columns from {}",
        records.len(),
        headers.len(),
        path.display()
    );

    Ok(Frame::new(headers, records))
}

/// Guess the type of a single CSV cell.
pub fn parse_cell(s: &str, dialect: CsvDialect) -> Value {
    let s = s.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if dialect.decimal_comma && s.matches(',').count() == 1 {
        if let Ok(f) = s.replace(',', ".").parse::<f64>() {
            return Value::Float(f);
        }
    }
    match s.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Load a single-column target file (`y_train.csv`, `y_test.csv`).
/// The first column is used; every cell must be numeric.
pub fn load_target(path: &Path) -> Result<Vec<f64>> {
    let frame = load_csv(path, CsvDialect::STANDARD)?;
    let column = frame
        .column_names
        .first()
        .with_context(|| format!("{} has no columns", path.display()))?
        .clone();

    frame
        .column(&column)
        .enumerate()
        .map(|(row, v)| {
            v.as_f64()
                .with_context(|| format!("{}: row {row} of '{column}' is not numeric ({v})", path.display()))
        })
        .collect()
}

/// Write a frame as standard CSV, columns in frame order.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer
        .write_record(&frame.column_names)
        .context("writing CSV header")?;

    for (row_no, rec) in frame.records.iter().enumerate() {
        let cells = frame.column_names.iter().map(|c| {
            rec.get(c).map(Value::to_raw_string).unwrap_or_default()
        });
        writer
            .write_record(cells)
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }

    writer.flush().context("flushing CSV writer")?;
    Ok(())
}

/// Write a target vector as a one-column CSV.
pub fn write_target(values: &[f64], column: &str, path: &Path) -> Result<()> {
    let frame = Frame::from_rows(
        &[column],
        values.iter().map(|&v| vec![Value::Float(v)]).collect(),
    );
    write_csv(&frame, path)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Crop": "Rice", "Rainfall_mm": 812.5, "Irrigation_Used": true },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Frame> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut column_names: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut record = BTreeMap::new();
        for (key, val) in obj {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
            record.insert(key.clone(), json_to_value(val));
        }
        records.push(record);
    }

    Ok(Frame::new(column_names, records))
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Unsupported column types are carried
/// as their type name so they surface in the aligner's coercion report.
fn load_parquet(path: &Path) -> Result<Frame> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        for row in 0..batch.num_rows() {
            let record: Record = column_names
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.clone(), extract_value(batch.column(idx), row)))
                .collect();
            records.push(record);
        }
    }

    Ok(Frame::new(column_names, records))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| Value::Integer(a.value(row) as i64))
            .unwrap_or(Value::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Integer(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| Value::Float(a.value(row) as f64))
            .unwrap_or(Value::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Float(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Bool(a.value(row)))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_primary_dialect_reads_comma_decimals() {
        let (_dir, path) = write_temp(
            "dataset.csv",
            "Soil_Type;Crop;Rainfall_mm;Fertilizer_Used;Yield_tons_per_hectare\n\
             Clay;Rice;897,08;True;6,55\n\
             Loam;Wheat;543;False;4,1\n",
        );

        let frame = load_file(&path).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.value(0, "Rainfall_mm"), &Value::Float(897.08));
        assert_eq!(frame.value(1, "Rainfall_mm"), &Value::Integer(543));
        assert_eq!(frame.value(0, "Fertilizer_Used"), &Value::Bool(true));
        assert_eq!(frame.value(1, "Yield_tons_per_hectare"), &Value::Float(4.1));
    }

    #[test]
    fn test_standard_dialect_keeps_commas_as_separators() {
        let (_dir, path) = write_temp("x.csv", "Rainfall_mm,Crop_Rice\n812.5,1\n,0\n");
        assert_eq!(sniff_dialect(&path).unwrap(), CsvDialect::STANDARD);

        let frame = load_file(&path).unwrap();
        assert_eq!(frame.column_names, vec!["Rainfall_mm", "Crop_Rice"]);
        assert_eq!(frame.value(0, "Rainfall_mm"), &Value::Float(812.5));
        assert_eq!(frame.value(1, "Rainfall_mm"), &Value::Null);
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let (_dir, path) = write_temp("bad.csv", "a,b\n1,2\n3\n");
        assert!(load_csv(&path, CsvDialect::STANDARD).is_err());
    }

    #[test]
    fn test_load_target_reads_first_column() {
        let (_dir, path) = write_temp("y.csv", "Yield_tons_per_hectare\n6.55\n4\n");
        assert_eq!(load_target(&path).unwrap(), vec![6.55, 4.0]);

        let (_dir2, bad) = write_temp("y_bad.csv", "Yield\nabc\n");
        assert!(load_target(&bad).is_err());
    }

    #[test]
    fn test_write_csv_preserves_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let frame = Frame::from_rows(
            &["Crop", "Predicted_Yield"],
            vec![vec!["Rice".into(), 5.25.into()]],
        );
        write_csv(&frame, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Crop,Predicted_Yield\nRice,5.25\n");
    }

    #[test]
    fn test_json_records() {
        let (_dir, path) = write_temp(
            "upload.json",
            r#"[{"Crop": "Rice", "Rainfall_mm": 812.5, "Irrigation_Used": true},
                {"Crop": "Maize", "Rainfall_mm": 700}]"#,
        );
        let frame = load_file(&path).unwrap();
        assert_eq!(frame.len(), 2);
        assert!(frame.has_column("Irrigation_Used"));
        assert_eq!(frame.value(1, "Irrigation_Used"), &Value::Null);
        assert_eq!(frame.value(1, "Rainfall_mm"), &Value::Integer(700));
    }

    #[test]
    fn test_parquet_columns_and_types() {
        use std::sync::Arc;

        use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let batch = RecordBatch::try_from_iter(vec![
            (
                "Crop",
                Arc::new(StringArray::from(vec![Some("Rice"), None])) as ArrayRef,
            ),
            (
                "Days_to_Harvest",
                Arc::new(Int64Array::from(vec![122, 104])) as ArrayRef,
            ),
            (
                "Rainfall_mm",
                Arc::new(Float64Array::from(vec![Some(897.08), None])) as ArrayRef,
            ),
            (
                "Irrigation_Used",
                Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef,
            ),
        ])
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let frame = load_file(&path).unwrap();
        assert_eq!(
            frame.column_names,
            vec!["Crop", "Days_to_Harvest", "Rainfall_mm", "Irrigation_Used"]
        );
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.value(0, "Crop"), &Value::String("Rice".to_string()));
        assert_eq!(frame.value(0, "Days_to_Harvest"), &Value::Integer(122));
        assert_eq!(frame.value(0, "Rainfall_mm"), &Value::Float(897.08));
        assert_eq!(frame.value(0, "Irrigation_Used"), &Value::Bool(true));
        assert_eq!(frame.value(1, "Crop"), &Value::Null);
        assert_eq!(frame.value(1, "Rainfall_mm"), &Value::Null);
        assert_eq!(frame.value(1, "Irrigation_Used"), &Value::Bool(false));
    }

    #[test]
    fn test_unsupported_extension() {
        let (_dir, path) = write_temp("data.xlsx", "");
        assert!(load_file(&path).is_err());
    }
}
