use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Float64Builder, LargeListArray, ListArray,
    ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Sweep;

// ---------------------------------------------------------------------------
// Capture – a recorded sweep plus its label
// ---------------------------------------------------------------------------

/// One recorded sweep. `x` holds frequencies in Hz, `y` amplitudes in dBm.
#[derive(Debug, Clone)]
pub struct Capture {
    pub sweep: Sweep,
    /// Value of the optional `label` column / field.
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load recorded sweeps from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x` and `y` list columns, one sweep per row
/// * `.json`    – `[{ "x": [...], "y": [...], "label": "..." }, ...]`
/// * `.csv`     – either `x`/`y` columns holding semicolon-separated floats,
///   or a plain two-column `frequency,amplitude` table (one sweep)
pub fn load_captures(path: &Path) -> Result<Vec<Capture>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let captures = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading captures from {}", path.display()))?;

    if captures.is_empty() {
        bail!("{} holds no sweeps", path.display());
    }
    info!("Loaded {} sweep(s) from {}", captures.len(), path.display());
    Ok(captures)
}

fn capture(x: Vec<f64>, y: Vec<f64>, label: Option<String>, row: usize) -> Result<Capture> {
    let sweep = Sweep::new(x, y).with_context(|| format!("Row {row}"))?;
    Ok(Capture { sweep, label })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON:
///
/// ```json
/// [
///   { "x": [1.0e6, 1.1e6, ...], "y": [-80.2, -79.9, ...], "label": "baseline" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Capture>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let obj = rec
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            let x = json_array_to_f64(obj.get("x"), i, "x")?;
            let y = json_array_to_f64(obj.get("y"), i, "y")?;
            let label = obj
                .get("label")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            capture(x, y, label, i)
        })
        .collect()
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

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

/// Two CSV layouts are accepted:
///
/// * a header with `x` and `y` columns containing semicolon-separated
///   floats (`"1e6;2e6;3e6"`, `"-80;-42;-79"`), one sweep per row, with an
///   optional `label` column;
/// * any other header followed by numeric `frequency,amplitude` rows, read
///   as a single sweep (the layout written by `stepped-sweep`).
fn load_csv(path: &Path) -> Result<Vec<Capture>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers.iter().position(|h| h == "x");
    let y_idx = headers.iter().position(|h| h == "y");
    let (x_idx, y_idx) = match (x_idx, y_idx) {
        (Some(x), Some(y)) => (x, y),
        _ => return load_csv_columns(reader).map(|c| vec![c]),
    };
    let label_idx = headers.iter().position(|h| h == "label");

    let mut captures = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = parse_semicolon_floats(record.get(x_idx).unwrap_or(""), row_no, "x")?;
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;
        let label = label_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        captures.push(capture(x, y, label, row_no)?);
    }
    Ok(captures)
}

fn load_csv_columns(mut reader: csv::Reader<std::fs::File>) -> Result<Capture> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, result) in reader.deserialize::<(f64, f64)>().enumerate() {
        let (frequency, amplitude) =
            result.with_context(|| format!("CSV row {row_no}: expected frequency,amplitude"))?;
        x.push(frequency);
        y.push(amplitude);
    }
    capture(x, y, None, 0)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
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

/// Expected schema:
/// - `x`: List<Float64> or LargeList<Float64> – frequencies in Hz
/// - `y`: List<Float64> or LargeList<Float64> – amplitudes in dBm
/// - `label` (optional): Utf8
fn load_parquet(path: &Path) -> Result<Vec<Capture>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut captures = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of("x")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;
        let label_col = schema.index_of("label").ok().map(|i| batch.column(i));

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        for row in 0..batch.num_rows() {
            let x = extract_f64_list(x_col, row)
                .with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;
            let label = label_col.and_then(|col| extract_label(col, row));
            captures.push(capture(x, y, label, row)?);
        }
    }

    Ok(captures)
}

// -- Parquet / Arrow helpers --

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

fn extract_label(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => Some(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Write captures in the layout [`load_captures`] reads back: `x`/`y`
/// Float64 list columns plus a nullable `label`.
pub fn write_parquet(path: &Path, captures: &[Capture]) -> Result<()> {
    let x_array = f64_list(captures.iter().map(|c| c.sweep.frequencies()));
    let y_array = f64_list(captures.iter().map(|c| c.sweep.amplitudes()));
    let label_array: StringArray = captures.iter().map(|c| c.label.as_deref()).collect();

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::List(item.clone()), false),
        Field::new("y", DataType::List(item), false),
        Field::new("label", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(x_array), Arc::new(y_array), Arc::new(label_array)],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    info!("Wrote {} sweep(s) to {}", captures.len(), path.display());
    Ok(())
}

fn f64_list<'a>(rows: impl Iterator<Item = &'a [f64]>) -> ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweeps.json");
        std::fs::write(
            &path,
            r#"[{"x": [1e6, 2e6, 3e6], "y": [-80, -40, -80], "label": "run a"},
                {"x": [1e6, 2e6], "y": [-70, -71]}]"#,
        )
        .unwrap();

        let caps = load_captures(&path).unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].label.as_deref(), Some("run a"));
        assert_eq!(caps[0].sweep.amplitudes(), &[-80.0, -40.0, -80.0]);
        assert!(caps[1].label.is_none());
    }

    #[test]
    fn loads_both_csv_layouts() {
        let dir = tempfile::tempdir().unwrap();

        let lists = dir.path().join("lists.csv");
        std::fs::write(&lists, "label,x,y\nbase,1e6;2e6;3e6,-80;-40;-80\n").unwrap();
        let caps = load_captures(&lists).unwrap();
        assert_eq!(caps[0].sweep.frequencies(), &[1e6, 2e6, 3e6]);
        assert_eq!(caps[0].label.as_deref(), Some("base"));

        let columns = dir.path().join("columns.csv");
        std::fs::write(&columns, "Frequency (Hz),Power (dBm)\n1e6,-50.5\n2e6,-49.0\n").unwrap();
        let caps = load_captures(&columns).unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].sweep.len(), 2);
    }

    #[test]
    fn rejects_descending_frequencies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"x": [3e6, 2e6], "y": [-1, -2]}]"#).unwrap();
        assert!(load_captures(&path).is_err());
    }

    #[test]
    fn parquet_keeps_labels_and_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captures.parquet");
        let captures = vec![
            Capture {
                sweep: Sweep::new(vec![1e6, 2e6, 3e6], vec![-80.0, -35.5, -79.0]).unwrap(),
                label: Some("bench".into()),
            },
            Capture {
                sweep: Sweep::new(vec![5e6, 6e6], vec![-60.0, -61.0]).unwrap(),
                label: None,
            },
        ];
        write_parquet(&path, &captures).unwrap();

        let loaded = load_captures(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sweep, captures[0].sweep);
        assert_eq!(loaded[0].label.as_deref(), Some("bench"));
        assert!(loaded[1].label.is_none());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        assert!(load_captures(Path::new("trace.bin")).is_err());
    }
}
