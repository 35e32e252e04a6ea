//! Sequential measurement and calibration runs.
//!
//! These functions contain no prompting; the binaries collect inputs and
//! hand them over, so each run can be driven directly from tests.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use crate::analysis::peaks::PeakDetector;
use crate::analysis::refine::{PeakRefiner, RecordContext};
use crate::analysis::segment::{Segment, plan_segments};
use crate::config::ScoutConfig;
use crate::data::compensation::{CompensationPoint, CompensationTable, extremes};
use crate::data::filter::{carrier_tolerance, search_stop_frequency};
use crate::data::model::{MeasurementRecord, Peak, Sweep};
use crate::error::{AcquisitionError, MeasureError, MeasureResult};
use crate::instrument::{SignalSource, SpectrumAnalyzer, TrackingGenerator};
use crate::units::format_frequency;

// ---------------------------------------------------------------------------
// Measurement: detect → refine each → report rows
// ---------------------------------------------------------------------------

/// A peak whose zero-span capture failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFailure {
    pub peak: Peak,
    pub error: AcquisitionError,
}

/// Outcome of a measurement run.
#[derive(Debug, Clone)]
pub struct MeasurementRun {
    /// The coarse sweep peaks were detected in.
    pub sweep: Sweep,
    /// One record per successfully refined peak, in frequency order.
    pub records: Vec<MeasurementRecord>,
    pub failures: Vec<PeakFailure>,
}

/// Frequency range searched for a given carrier.
///
/// Sweep edges are never reported as peaks, so when the carrier sits at or
/// just above the configured start the sweep begins at half the carrier
/// frequency instead.
pub fn search_range(config: &ScoutConfig, carrier_hz: f64) -> (f64, f64) {
    let mut start_hz = config.search_start_hz;
    if carrier_hz - start_hz < carrier_tolerance(carrier_hz) {
        start_hz = start_hz.min(carrier_hz / 2.0);
    }
    (start_hz, search_stop_frequency(carrier_hz))
}

/// Sweep the search range, detect peaks and refine every one of them.
///
/// The coarse sweep failing, or the compensation table being empty, ends the
/// run with an error. A peak whose zero-span capture fails is recorded in
/// [`MeasurementRun::failures`] and the remaining peaks are still measured.
pub fn measure(
    analyzer: &mut dyn SpectrumAnalyzer,
    table: &CompensationTable,
    config: &ScoutConfig,
    context: &RecordContext,
) -> MeasureResult<MeasurementRun> {
    if table.is_empty() {
        return Err(MeasureError::EmptyTable);
    }
    let refiner = PeakRefiner::new(config.zero_span_averages)?;
    let mut detector = PeakDetector::new(config.min_prominence_db, config.min_spacing_hz);
    if let Some(max) = config.max_peaks {
        detector = detector.with_max_peaks(max);
    }

    let (start_hz, stop_hz) = search_range(config, context.carrier_hz);
    info!(
        "Searching {} .. {} for emissions",
        format_frequency(start_hz),
        format_frequency(stop_hz)
    );
    let sweep = analyzer.capture_sweep(start_hz, stop_hz, config.sweep_points)?;
    let peaks = detector.detect(&sweep);
    info!("Found {} candidate peaks", peaks.len());

    let mut records = Vec::with_capacity(peaks.len());
    let mut failures = Vec::new();
    for peak in &peaks {
        match refiner.refine(peak, context, analyzer, table) {
            Ok(record) => records.push(record),
            Err(MeasureError::Acquisition(error)) => {
                warn!(
                    "Skipping peak at {}: {error}",
                    format_frequency(peak.frequency)
                );
                failures.push(PeakFailure { peak: *peak, error });
            }
            Err(other) => return Err(other),
        }
    }

    Ok(MeasurementRun {
        sweep,
        records,
        failures,
    })
}

// ---------------------------------------------------------------------------
// Calibration: segment → tracking sweep each → points
// ---------------------------------------------------------------------------

/// A calibration segment that could not be captured.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    pub segment: Segment,
    pub error: AcquisitionError,
}

/// Outcome of a calibration run, ready to merge into a table.
#[derive(Debug, Clone, Default)]
pub struct CalibrationRun {
    pub points: Vec<CompensationPoint>,
    pub failures: Vec<SegmentFailure>,
}

impl CalibrationRun {
    /// Points with the lowest and highest attenuation measured.
    pub fn extremes(&self) -> Option<(CompensationPoint, CompensationPoint)> {
        extremes(&self.points)
    }

    /// Merge the measured points into `table`.
    pub fn merge_into(&self, table: &mut CompensationTable, tolerance: f64) {
        let summary = table.merge(&self.points, tolerance);
        info!(
            "Merged {} new points, superseding {} existing",
            summary.added, summary.replaced
        );
    }

    /// Merge the measured points into the table file at `path` and rewrite
    /// it. A run without points leaves the file untouched and returns `None`.
    pub fn update_table(&self, path: &Path, tolerance: f64) -> Result<Option<CompensationTable>> {
        if self.points.is_empty() {
            warn!("No calibration points measured, {} left untouched", path.display());
            return Ok(None);
        }
        let mut table = CompensationTable::load_or_empty(path)?;
        self.merge_into(&mut table, tolerance);
        table.save_path(path)?;
        Ok(Some(table))
    }
}

/// Characterise the external path over `[start_hz, end_hz]`.
///
/// The range is split so that no sweep exceeds `config.max_ratio`. Each
/// segment is swept with the tracking generator at
/// `config.tracking_power_dbm`, and attenuation is taken as source level
/// minus received level. The generator is switched off afterwards, also
/// when a segment fails.
pub fn calibrate<A>(
    analyzer: &mut A,
    start_hz: f64,
    end_hz: f64,
    config: &ScoutConfig,
) -> MeasureResult<CalibrationRun>
where
    A: TrackingGenerator + ?Sized,
{
    let segments = plan_segments(start_hz, end_hz, config.max_ratio, config.sweep_points)?;
    let source_dbm = config.tracking_power_dbm;
    analyzer.set_source_power(Some(source_dbm))?;

    let mut run = CalibrationRun::default();
    for (i, segment) in segments.iter().enumerate() {
        info!(
            "Measuring sub-range {}/{}: {} to {}",
            i + 1,
            segments.len(),
            format_frequency(segment.start_hz),
            format_frequency(segment.end_hz)
        );
        match analyzer.capture_sweep(segment.start_hz, segment.end_hz, segment.points) {
            Ok(sweep) => run.points.extend(
                sweep
                    .samples()
                    .map(|(f, level)| CompensationPoint::new(f, source_dbm - level)),
            ),
            Err(error) => {
                warn!("Sub-range {} failed: {error}", i + 1);
                run.failures.push(SegmentFailure {
                    segment: *segment,
                    error,
                });
            }
        }
    }

    analyzer.set_source_power(None)?;
    Ok(run)
}

// ---------------------------------------------------------------------------
// Stepped sweep: tune source → zero span, point by point
// ---------------------------------------------------------------------------

/// Tune `source` to each frequency in turn and read the analyzer in zero
/// span at the same frequency. Results come back sorted by frequency.
///
/// RF is enabled for the run and disabled again before returning.
pub fn stepped_sweep(
    analyzer: &mut dyn SpectrumAnalyzer,
    source: &mut dyn SignalSource,
    frequencies: &[f64],
    power_dbm: f64,
    averages: usize,
) -> MeasureResult<Vec<(f64, f64)>> {
    source.set_power(power_dbm)?;
    source.enable_rf(true)?;

    let mut results = Vec::with_capacity(frequencies.len());
    let outcome = frequencies.iter().try_for_each(|&f| {
        source.set_frequency(f)?;
        let power = analyzer.capture_zero_span(f, averages)?;
        info!("{:.3} MHz: {power:.2} dBm", f / 1e6);
        results.push((f, power));
        Ok::<(), AcquisitionError>(())
    });
    source.enable_rf(false)?;
    outcome?;

    results.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Emitter, ScenarioConfig};
    use crate::data::model::PeakKind;
    use crate::instrument::SimulatedAnalyzer;

    fn bench() -> ScenarioConfig {
        ScenarioConfig {
            noise_sigma_db: 0.0,
            emitters: vec![
                Emitter {
                    frequency_hz: 100e6,
                    power_dbm: -10.0,
                    width_hz: 3e6,
                },
                Emitter {
                    frequency_hz: 1.2e9,
                    power_dbm: -40.0,
                    width_hz: 3e6,
                },
            ],
            path_loss: vec![
                CompensationPoint::new(100e3, 1.0),
                CompensationPoint::new(2.5e9, 9.0),
            ],
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn measurement_classifies_and_compensates() {
        let mut sa = SimulatedAnalyzer::new(bench());
        let table = CompensationTable::from_points(bench().path_loss);
        let config = ScoutConfig {
            sweep_points: 2001,
            ..ScoutConfig::default()
        };
        let context = RecordContext::new(7, 100e6, "");

        let run = measure(&mut sa, &table, &config, &context).unwrap();
        assert!(run.failures.is_empty());
        assert_eq!(run.records.len(), 2);
        assert_eq!(run.records[0].kind, PeakKind::Carrier);
        assert_eq!(run.records[1].kind, PeakKind::Spurious);
        assert!(run.records.iter().all(|r| r.index == 7));
        // Compensation undoes the path, so corrected ≈ emitter level.
        assert!((run.records[0].corrected_power + 10.0).abs() < 0.5);
        assert!((run.records[1].corrected_power + 40.0).abs() < 0.5);
    }

    #[test]
    fn carrier_at_the_search_start_is_still_found() {
        let config = ScoutConfig::default();
        assert_eq!(search_range(&config, 100e3), (50e3, 10e6));
        assert_eq!(search_range(&config, 300e3), (100e3, 10e6));

        let mut sa = SimulatedAnalyzer::new(ScenarioConfig {
            noise_sigma_db: 0.0,
            emitters: vec![Emitter {
                frequency_hz: 100e3,
                power_dbm: -20.0,
                width_hz: 10e3,
            }],
            ..ScenarioConfig::default()
        });
        let table = CompensationTable::from_points([CompensationPoint::new(1e6, 1.0)]);
        let context = RecordContext::new(0, config.carrier_min_hz, "");

        let run = measure(&mut sa, &table, &config, &context).unwrap();
        assert_eq!(run.records.len(), 1);
        assert_eq!(run.records[0].kind, PeakKind::Carrier);
        assert!((run.records[0].corrected_power + 19.0).abs() < 0.1);
    }

    #[test]
    fn calibration_recovers_path_loss() {
        let mut sa = SimulatedAnalyzer::new(ScenarioConfig {
            emitters: Vec::new(),
            ..bench()
        });
        let config = ScoutConfig {
            sweep_points: 51,
            ..ScoutConfig::default()
        };
        let run = calibrate(&mut sa, 1e6, 50e6, &config).unwrap();
        assert!(run.failures.is_empty());
        assert_eq!(run.points.len(), 102);
        for p in &run.points {
            assert!((p.attenuation - sa.path_loss(p.frequency)).abs() < 0.01);
        }
        let (min, max) = run.extremes().unwrap();
        assert!(min.attenuation <= max.attenuation);

        let mut table = CompensationTable::new();
        run.merge_into(&mut table, 0.1);
        // The shared 10 MHz boundary collapses to one point.
        assert_eq!(table.len(), 101);
    }

    #[test]
    fn stepped_sweep_sorts_results() {
        let mut sa = SimulatedAnalyzer::new(ScenarioConfig {
            emitters: Vec::new(),
            ..bench()
        });
        let mut source = sa.source();
        let results = stepped_sweep(&mut sa, &mut source, &[300e6, 100e6, 200e6], 0.0, 1).unwrap();
        let freqs: Vec<f64> = results.iter().map(|r| r.0).collect();
        assert_eq!(freqs, vec![100e6, 200e6, 300e6]);
        assert!((results[0].1 + sa.path_loss(100e6)).abs() < 0.01);
    }
}
