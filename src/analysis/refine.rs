//! Zero-span refinement of detected peaks.

use chrono::{DateTime, Local};
use log::{debug, warn};

use crate::data::compensation::CompensationTable;
use crate::data::filter::classify;
use crate::data::model::{MeasurementRecord, Peak};
use crate::error::{MeasureError, MeasureResult};
use crate::instrument::SpectrumAnalyzer;

/// Default number of zero-span readings averaged per peak.
pub const DEFAULT_AVERAGES: usize = 10;

/// Caller-owned details stamped onto every record of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContext {
    /// Report index shared by all records of this run.
    pub index: u64,
    pub timestamp: DateTime<Local>,
    pub note: String,
    /// Carrier the peaks are classified against.
    pub carrier_hz: f64,
}

impl RecordContext {
    pub fn new(index: u64, carrier_hz: f64, note: impl Into<String>) -> Self {
        Self {
            index,
            timestamp: Local::now(),
            note: note.into(),
            carrier_hz,
        }
    }
}

/// Re-measures peaks in zero span and applies external compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakRefiner {
    averages: usize,
}

impl Default for PeakRefiner {
    fn default() -> Self {
        Self {
            averages: DEFAULT_AVERAGES,
        }
    }
}

impl PeakRefiner {
    /// A refiner averaging `averages` zero-span readings per peak.
    pub fn new(averages: usize) -> MeasureResult<Self> {
        if averages == 0 {
            return Err(MeasureError::InvalidAverages);
        }
        Ok(Self { averages })
    }

    pub fn averages(&self) -> usize {
        self.averages
    }

    /// Refine one peak into a report record.
    ///
    /// Compensation is looked up before the instrument is touched, so an
    /// empty table fails fast with [`MeasureError::EmptyTable`]. A failed
    /// capture comes back as [`MeasureError::Acquisition`] and affects only
    /// this peak.
    pub fn refine(
        &self,
        peak: &Peak,
        context: &RecordContext,
        analyzer: &mut dyn SpectrumAnalyzer,
        table: &CompensationTable,
    ) -> MeasureResult<MeasurementRecord> {
        let compensation_used = table.interpolate(peak.frequency)?;

        let raw_power = analyzer
            .capture_zero_span(peak.frequency, self.averages)
            .inspect_err(|e| warn!("zero span at {} Hz failed: {e}", peak.frequency))?;
        let corrected_power = raw_power + compensation_used;
        debug!(
            "peak {} Hz: sweep {:.2} dBm, zero span {raw_power:.2} dBm, +{compensation_used:.2} dB",
            peak.frequency, peak.raw_amplitude
        );

        Ok(MeasurementRecord {
            index: context.index,
            timestamp: context.timestamp,
            kind: classify(peak.frequency, context.carrier_hz),
            note: context.note.clone(),
            peak_frequency: peak.frequency,
            raw_power,
            compensation_used,
            corrected_power,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::compensation::CompensationPoint;
    use crate::data::model::{PeakKind, Sweep};
    use crate::error::{AcquisitionError, MeasureError};

    /// Reports a fixed power and counts zero-span calls.
    struct FixedAnalyzer {
        power: Result<f64, AcquisitionError>,
        calls: Vec<(f64, usize)>,
    }

    impl SpectrumAnalyzer for FixedAnalyzer {
        fn identity(&mut self) -> Result<String, AcquisitionError> {
            Ok("fixed".into())
        }

        fn capture_sweep(&mut self, start_hz: f64, end_hz: f64, _points: usize) -> Result<Sweep, AcquisitionError> {
            Err(AcquisitionError::NoData { start_hz, end_hz })
        }

        fn capture_zero_span(&mut self, center_hz: f64, averages: usize) -> Result<f64, AcquisitionError> {
            self.calls.push((center_hz, averages));
            self.power.clone()
        }
    }

    fn peak(frequency: f64) -> Peak {
        Peak {
            frequency,
            raw_amplitude: -45.0,
            index: 12,
            prominence: 30.0,
        }
    }

    #[test]
    fn adds_compensation_to_zero_span_power() {
        let table = CompensationTable::from_points([
            CompensationPoint::new(50e6, 4.0),
            CompensationPoint::new(150e6, 8.0),
        ]);
        let mut analyzer = FixedAnalyzer {
            power: Ok(-40.0),
            calls: Vec::new(),
        };
        let context = RecordContext::new(3, 100e6, "dut a");
        let refiner = PeakRefiner::new(16).unwrap();

        let record = refiner
            .refine(&peak(100e6), &context, &mut analyzer, &table)
            .unwrap();

        assert_eq!(analyzer.calls, vec![(100e6, 16)]);
        assert_eq!(record.compensation_used, 6.0);
        assert_eq!(record.corrected_power, -34.0);
        assert_eq!(record.raw_power, -40.0);
        assert_eq!(record.index, 3);
        assert_eq!(record.kind, PeakKind::Carrier);
        assert_eq!(record.note, "dut a");
    }

    #[test]
    fn empty_table_fails_before_capture() {
        let mut analyzer = FixedAnalyzer {
            power: Ok(-40.0),
            calls: Vec::new(),
        };
        let context = RecordContext::new(0, 10e6, "");
        let err = PeakRefiner::default()
            .refine(&peak(30e6), &context, &mut analyzer, &CompensationTable::new())
            .unwrap_err();
        assert_eq!(err, MeasureError::EmptyTable);
        assert!(analyzer.calls.is_empty());
    }

    #[test]
    fn acquisition_failure_is_reported() {
        let mut analyzer = FixedAnalyzer {
            power: Err(AcquisitionError::Timeout {
                operation: "zero span".into(),
                after_ms: 10_000,
            }),
            calls: Vec::new(),
        };
        let table = CompensationTable::from_points([CompensationPoint::new(1e6, 1.0)]);
        let context = RecordContext::new(0, 10e6, "");
        let err = PeakRefiner::default()
            .refine(&peak(30e6), &context, &mut analyzer, &table)
            .unwrap_err();
        assert!(err.is_acquisition());
    }

    #[test]
    fn zero_averages_is_rejected() {
        assert_eq!(PeakRefiner::new(0), Err(MeasureError::InvalidAverages));
    }
}
