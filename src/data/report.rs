use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use super::model::MeasurementRecord;

/// Column holding the per-run measurement index.
pub const INDEX_COLUMN: &str = "measurement_index";

// ---------------------------------------------------------------------------
// Index bookkeeping
// ---------------------------------------------------------------------------

/// Index for the next run: one past the highest `measurement_index` already
/// in the report, or 0 when there is nothing to continue from.
///
/// Rows whose index does not parse are skipped. A report without the index
/// column restarts at 0 with a warning.
pub fn next_measurement_index(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening report {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("reading report header {}", path.display()))?
        .clone();
    if headers.is_empty() {
        return Ok(0);
    }
    let Some(column) = headers.iter().position(|h| h.trim() == INDEX_COLUMN) else {
        warn!(
            "'{INDEX_COLUMN}' column not found in {}, starting at index 0",
            path.display()
        );
        return Ok(0);
    };

    let max_index = reader
        .records()
        .filter_map(|row| row.ok())
        .filter_map(|row| row.get(column)?.trim().parse::<u64>().ok())
        .max();
    Ok(max_index.map_or(0, |max| max + 1))
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append records to the report, writing the header row only when the file
/// is new or empty. Existing rows are never rewritten.
pub fn append_records(path: &Path, records: &[MeasurementRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let needs_header = std::fs::metadata(path).map_or(true, |m| m.len() == 0);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {} for append", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("writing report row for {} Hz", record.peak_frequency))?;
    }
    writer.flush()?;

    info!(
        "Appended {} peaks to {} with measurement index {}",
        records.len(),
        path.display(),
        records[0].index
    );
    Ok(())
}

/// Read every record back from a report file.
pub fn read_records(path: &Path) -> Result<Vec<MeasurementRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(row_no, row)| row.with_context(|| format!("report row {row_no}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::PeakKind;
    use chrono::Local;

    fn record(index: u64, frequency: f64) -> MeasurementRecord {
        MeasurementRecord {
            index,
            timestamp: Local::now(),
            kind: PeakKind::Spurious,
            note: "bench, run 1".into(),
            peak_frequency: frequency,
            raw_power: -40.0,
            compensation_used: 6.0,
            corrected_power: -34.0,
        }
    }

    #[test]
    fn missing_report_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_measurement_index(&dir.path().join("none.csv")).unwrap(), 0);
    }

    #[test]
    fn index_continues_after_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peak_report.csv");

        append_records(&path, &[record(0, 100e6), record(0, 200e6)]).unwrap();
        append_records(&path, &[record(4, 300e6)]).unwrap();
        assert_eq!(next_measurement_index(&path).unwrap(), 5);

        let rows = read_records(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].peak_frequency, 200e6);
        assert_eq!(rows[2].index, 4);
        assert_eq!(rows[0].note, "bench, run 1");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches(INDEX_COLUMN).count(), 1);
        assert!(text.starts_with(
            "measurement_index,timestamp,peak_type,note,frequency_hz,\
             measured_power_dbm,compensation_db,corrected_power_dbm"
        ));
    }

    #[test]
    fn foreign_report_without_index_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert_eq!(next_measurement_index(&path).unwrap(), 0);
    }

    #[test]
    fn unparseable_indices_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peak_report.csv");
        std::fs::write(&path, "measurement_index,note\n2,a\nx,b\n7,c\n").unwrap();
        assert_eq!(next_measurement_index(&path).unwrap(), 8);
    }
}
