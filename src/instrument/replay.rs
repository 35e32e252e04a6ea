use std::path::Path;

use anyhow::{Result, bail};
use log::debug;

use super::{AcquisitionResult, SpectrumAnalyzer};
use crate::data::loader::{Capture, load_captures};
use crate::data::model::Sweep;
use crate::error::AcquisitionError;

// ---------------------------------------------------------------------------
// ReplayAnalyzer – serves recorded sweeps
// ---------------------------------------------------------------------------

/// Analyzer backed by recorded captures.
///
/// A sweep request returns the selected capture cut to the requested range;
/// a zero-span request returns the capture's amplitude interpolated at the
/// center frequency (averaging has nothing to smooth on recorded data).
#[derive(Debug, Clone)]
pub struct ReplayAnalyzer {
    captures: Vec<Capture>,
    selected: usize,
}

impl ReplayAnalyzer {
    pub fn new(captures: Vec<Capture>) -> Result<Self> {
        if captures.is_empty() {
            bail!("replay needs at least one capture");
        }
        Ok(Self {
            captures,
            selected: 0,
        })
    }

    /// Load captures from a sweep file (see [`load_captures`]).
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::new(load_captures(path)?)
    }

    /// Choose which capture subsequent requests are served from.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.captures.len() {
            bail!(
                "capture {index} requested but only {} loaded",
                self.captures.len()
            );
        }
        self.selected = index;
        Ok(())
    }

    fn current(&self) -> &Capture {
        &self.captures[self.selected]
    }
}

impl SpectrumAnalyzer for ReplayAnalyzer {
    fn identity(&mut self) -> AcquisitionResult<String> {
        let capture = self.current();
        Ok(match &capture.label {
            Some(label) => format!("replay:{label}"),
            None => format!("replay:#{}", self.selected),
        })
    }

    fn capture_sweep(&mut self, start_hz: f64, end_hz: f64, points: usize) -> AcquisitionResult<Sweep> {
        debug!("replay sweep {start_hz} Hz .. {end_hz} Hz ({points} points requested)");
        let sweep = self.current().sweep.slice(start_hz, end_hz);
        if sweep.is_empty() {
            return Err(AcquisitionError::NoData { start_hz, end_hz });
        }
        Ok(sweep)
    }

    fn capture_zero_span(&mut self, center_hz: f64, averages: usize) -> AcquisitionResult<f64> {
        debug!("replay zero span at {center_hz} Hz ({averages} averages)");
        self.current()
            .sweep
            .amplitude_at(center_hz)
            .ok_or(AcquisitionError::NoData {
                start_hz: center_hz,
                end_hz: center_hz,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ReplayAnalyzer {
        let sweep = Sweep::new(vec![1e6, 2e6, 3e6, 4e6], vec![-80.0, -40.0, -60.0, -80.0]).unwrap();
        ReplayAnalyzer::new(vec![Capture {
            sweep,
            label: Some("bench".into()),
        }])
        .unwrap()
    }

    #[test]
    fn serves_slices_and_interpolated_points() {
        let mut sa = analyzer();
        assert_eq!(sa.identity().unwrap(), "replay:bench");
        let sweep = sa.capture_sweep(1.5e6, 3e6, 401).unwrap();
        assert_eq!(sweep.frequencies(), &[2e6, 3e6]);
        assert_eq!(sa.capture_zero_span(2.5e6, 10).unwrap(), -50.0);
    }

    #[test]
    fn out_of_range_requests_fail() {
        let mut sa = analyzer();
        assert!(matches!(
            sa.capture_sweep(10e6, 20e6, 401),
            Err(AcquisitionError::NoData { .. })
        ));
        assert!(sa.capture_zero_span(5e6, 1).is_err());
        assert!(sa.select(1).is_err());
        assert!(ReplayAnalyzer::new(Vec::new()).is_err());
    }
}
