use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MeasureError, MeasureResult};

/// Comment line written at the top of every saved table.
pub const TABLE_HEADER: &str = "# Frequency (Hz), Attenuation (dB)";

// ---------------------------------------------------------------------------
// CompensationPoint
// ---------------------------------------------------------------------------

/// External path loss measured at one frequency. Attenuation is stored as a
/// positive loss in dB, to be added back onto raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensationPoint {
    pub frequency: f64,
    pub attenuation: f64,
}

impl CompensationPoint {
    pub fn new(frequency: f64, attenuation: f64) -> Self {
        Self {
            frequency,
            attenuation,
        }
    }

    /// Whether this point's frequency lies within `tolerance` (a fraction)
    /// of `frequency`.
    fn within(&self, frequency: f64, tolerance: f64) -> bool {
        self.frequency >= frequency * (1.0 - tolerance)
            && self.frequency <= frequency * (1.0 + tolerance)
    }
}

// ---------------------------------------------------------------------------
// CompensationTable
// ---------------------------------------------------------------------------

/// Frequency → attenuation samples, sorted by frequency with no two points
/// sharing a frequency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompensationTable {
    points: Vec<CompensationPoint>,
}

/// What a [`CompensationTable::merge`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Existing points superseded by the new batch.
    pub replaced: usize,
    /// Points taken from the new batch.
    pub added: usize,
}

impl CompensationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from unordered points. When several points share a
    /// frequency exactly, the last one wins.
    pub fn from_points(points: impl IntoIterator<Item = CompensationPoint>) -> Self {
        let mut table = Self::default();
        table.insert_sorted(points);
        table
    }

    pub fn points(&self) -> &[CompensationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Attenuation at `frequency`.
    ///
    /// * one point → that point's value everywhere
    /// * between samples → linear interpolation
    /// * outside the table → value of the nearest edge point
    ///
    /// A non-finite `frequency` is rejected with
    /// [`MeasureError::InvalidFrequency`].
    pub fn interpolate(&self, frequency: f64) -> MeasureResult<f64> {
        if !frequency.is_finite() {
            return Err(MeasureError::InvalidFrequency(frequency));
        }
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(MeasureError::EmptyTable),
        };
        if self.points.len() == 1 || frequency <= first.frequency {
            return Ok(first.attenuation);
        }
        if frequency >= last.frequency {
            return Ok(last.attenuation);
        }

        let hi = self.points.partition_point(|p| p.frequency < frequency);
        let upper = self.points[hi];
        if upper.frequency == frequency {
            return Ok(upper.attenuation);
        }
        let lower = self.points[hi - 1];
        let t = (frequency - lower.frequency) / (upper.frequency - lower.frequency);
        Ok(lower.attenuation + t * (upper.attenuation - lower.attenuation))
    }

    /// Merge a freshly measured batch into the table.
    ///
    /// Every existing point within `tolerance` (relative, `0.1` = ±10 %) of
    /// any new point's frequency is dropped, then the whole batch is
    /// inserted. New points close to each other are all kept; only exact
    /// frequency duplicates collapse (last one wins).
    pub fn merge(&mut self, new_points: &[CompensationPoint], tolerance: f64) -> MergeSummary {
        let tolerance = tolerance.max(0.0);
        let before = self.points.len();
        self.points
            .retain(|old| !new_points.iter().any(|new| old.within(new.frequency, tolerance)));
        let replaced = before - self.points.len();

        self.insert_sorted(new_points.iter().copied());
        debug!(
            "merged {} points at ±{:.1}% tolerance, replaced {replaced}",
            new_points.len(),
            tolerance * 100.0
        );
        MergeSummary {
            replaced,
            added: new_points.len(),
        }
    }

    fn insert_sorted(&mut self, points: impl IntoIterator<Item = CompensationPoint>) {
        self.points.extend(points);
        // Stable sort keeps insertion order among equal frequencies, so the
        // later point survives the dedup below.
        self.points
            .sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        let mut deduped: Vec<CompensationPoint> = Vec::with_capacity(self.points.len());
        for point in self.points.drain(..) {
            match deduped.last_mut() {
                Some(prev) if prev.frequency == point.frequency => *prev = point,
                _ => deduped.push(point),
            }
        }
        self.points = deduped;
    }

    /// Smallest and largest attenuation as `(point_with_min, point_with_max)`.
    pub fn extremes(&self) -> Option<(CompensationPoint, CompensationPoint)> {
        extremes(&self.points)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Read a two-column `frequency,attenuation` CSV. `#` comment lines and
    /// a single non-numeric header row are skipped.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut points = Vec::new();
        for (row_no, result) in csv_reader.records().enumerate() {
            let record = result.with_context(|| format!("compensation row {row_no}"))?;
            if record.len() < 2 {
                bail!("compensation row {row_no}: expected 2 columns, got {}", record.len());
            }
            let frequency = record[0].parse::<f64>();
            let attenuation = record[1].parse::<f64>();
            match (frequency, attenuation) {
                (Ok(frequency), Ok(attenuation)) => {
                    if !frequency.is_finite() || !attenuation.is_finite() {
                        bail!("compensation row {row_no}: non-finite value");
                    }
                    points.push(CompensationPoint::new(frequency, attenuation));
                }
                _ if row_no == 0 => {
                    debug!("skipping compensation header row {:?}", record);
                }
                _ => bail!(
                    "compensation row {row_no}: '{}', '{}' is not a number pair",
                    &record[0],
                    &record[1]
                ),
            }
        }
        Ok(Self::from_points(points))
    }

    /// Write the table as CSV, preceded by [`TABLE_HEADER`].
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{TABLE_HEADER}")?;
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for point in &self.points {
            csv_writer.serialize((point.frequency, point.attenuation))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Load a table file.
    pub fn load_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening compensation file {}", path.display()))?;
        let table = Self::load(file)
            .with_context(|| format!("reading compensation file {}", path.display()))?;
        info!("Loaded {} compensation points from {}", table.len(), path.display());
        Ok(table)
    }

    /// Load a table file, treating a missing file as an empty table.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_path(path)
        } else {
            info!("{} not found, starting an empty compensation table", path.display());
            Ok(Self::new())
        }
    }

    /// Rewrite the table file in full.
    ///
    /// Writes to a temp file next to `path` and renames it over the target,
    /// so an interrupted save leaves the previous table intact.
    pub fn save_path(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        self.save(&mut temp)?;
        temp.flush()?;
        temp.persist(path)
            .with_context(|| format!("replacing {}", path.display()))?;

        info!("Wrote {} compensation points to {}", self.len(), path.display());
        Ok(())
    }
}

/// Point with the smallest and the largest attenuation. Ties keep the
/// lowest frequency.
pub fn extremes(points: &[CompensationPoint]) -> Option<(CompensationPoint, CompensationPoint)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(min, max), &p| {
        (
            if p.attenuation < min.attenuation { p } else { min },
            if p.attenuation > max.attenuation { p } else { max },
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(f64, f64)]) -> CompensationTable {
        CompensationTable::from_points(pairs.iter().map(|&(f, a)| CompensationPoint::new(f, a)))
    }

    #[test]
    fn empty_table_refuses_to_interpolate() {
        assert_eq!(
            CompensationTable::new().interpolate(1e6),
            Err(MeasureError::EmptyTable)
        );
    }

    #[test]
    fn single_point_is_flat() {
        let t = table(&[(50e6, 3.5)]);
        for f in [1.0, 50e6, 26e9, 1e15] {
            assert_eq!(t.interpolate(f).unwrap(), 3.5);
        }
    }

    #[test]
    fn exact_at_samples_and_clamped_outside() {
        let t = table(&[(10e6, 1.0), (100e6, 4.0), (1e9, 10.0)]);
        assert_eq!(t.interpolate(10e6).unwrap(), 1.0);
        assert_eq!(t.interpolate(100e6).unwrap(), 4.0);
        assert_eq!(t.interpolate(1e9).unwrap(), 10.0);
        assert_eq!(t.interpolate(1e3).unwrap(), 1.0);
        assert_eq!(t.interpolate(20e9).unwrap(), 10.0);
    }

    #[test]
    fn interpolates_linearly_between_neighbours() {
        let t = table(&[(100e6, 2.0), (200e6, 6.0)]);
        assert!((t.interpolate(150e6).unwrap() - 4.0).abs() < 1e-12);
        assert!((t.interpolate(125e6).unwrap() - 3.0).abs() < 1e-12);

        let falling = table(&[(1e6, 9.0), (2e6, 1.0)]);
        for k in 1..100 {
            let v = falling.interpolate(1e6 + k as f64 * 1e4).unwrap();
            assert!((1.0..=9.0).contains(&v));
        }
    }

    #[test]
    fn non_finite_frequency_is_an_error() {
        let t = table(&[(100e6, 2.0), (200e6, 6.0)]);
        assert!(matches!(
            t.interpolate(f64::NAN),
            Err(MeasureError::InvalidFrequency(f)) if f.is_nan()
        ));
        assert_eq!(
            t.interpolate(f64::INFINITY),
            Err(MeasureError::InvalidFrequency(f64::INFINITY))
        );
        assert!(table(&[(50e6, 3.5)]).interpolate(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn from_points_sorts_and_collapses_exact_duplicates() {
        let t = table(&[(3.0, 0.3), (1.0, 0.1), (3.0, 0.33), (2.0, 0.2)]);
        let freqs: Vec<f64> = t.points().iter().map(|p| p.frequency).collect();
        assert_eq!(freqs, vec![1.0, 2.0, 3.0]);
        assert_eq!(t.points()[2].attenuation, 0.33);
    }

    #[test]
    fn merge_twice_keeps_one_point() {
        let mut t = table(&[(10e6, 1.0)]);
        let batch = [CompensationPoint::new(100e6, 5.0)];
        t.merge(&batch, 0.1);
        let summary = t.merge(&batch, 0.1);
        assert_eq!(summary, MergeSummary { replaced: 1, added: 1 });
        assert_eq!(t.len(), 2);
        assert_eq!(t.interpolate(100e6).unwrap(), 5.0);
    }

    #[test]
    fn merge_supersedes_only_nearby_points() {
        let mut t = table(&[(10e6, 1.0), (95e6, 2.0), (105e6, 2.5), (500e6, 7.0)]);
        t.merge(&[CompensationPoint::new(100e6, 3.0)], 0.1);
        assert_eq!(
            t.points(),
            &[
                CompensationPoint::new(10e6, 1.0),
                CompensationPoint::new(100e6, 3.0),
                CompensationPoint::new(500e6, 7.0),
            ]
        );
    }

    #[test]
    fn merge_keeps_close_points_within_one_batch() {
        let mut t = CompensationTable::new();
        t.merge(
            &[CompensationPoint::new(100e6, 3.0), CompensationPoint::new(101e6, 3.1)],
            0.1,
        );
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn loads_header_comments_and_single_rows() {
        let text = "# Frequency (Hz), Attenuation (dB)\n1000000.0,2.5\n";
        let t = CompensationTable::load(text.as_bytes()).unwrap();
        assert_eq!(t.points(), &[CompensationPoint::new(1e6, 2.5)]);

        let with_header = "frequency,attenuation\n2e6, 1.0\n1e6, 0.5\n";
        let t = CompensationTable::load(with_header.as_bytes()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.points()[0].frequency, 1e6);

        assert!(CompensationTable::load("1e6,1\nabc,def\n".as_bytes()).is_err());
    }

    #[test]
    fn save_then_load_preserves_points() {
        let t = table(&[(100e3, 0.25), (1.5e9, 12.125), (10e9, 31.0)]);
        let mut buf = Vec::new();
        t.save(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(TABLE_HEADER));
        assert_eq!(CompensationTable::load(buf.as_slice()).unwrap(), t);
    }

    #[test]
    fn extremes_report_min_and_max() {
        let t = table(&[(1.0, 4.0), (2.0, -1.0), (3.0, 9.0)]);
        let (min, max) = t.extremes().unwrap();
        assert_eq!(min, CompensationPoint::new(2.0, -1.0));
        assert_eq!(max, CompensationPoint::new(3.0, 9.0));
        assert!(CompensationTable::new().extremes().is_none());
    }
}
