use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, MeasureResult};

// ---------------------------------------------------------------------------
// Sweep – one swept capture from the analyzer
// ---------------------------------------------------------------------------

/// A swept spectrum: amplitude (dBm) sampled at strictly increasing
/// frequencies (Hz). Fields are private so the ordering invariant holds for
/// the lifetime of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    frequencies: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl Sweep {
    /// Build a sweep, checking lengths and frequency ordering.
    pub fn new(frequencies: Vec<f64>, amplitudes: Vec<f64>) -> MeasureResult<Self> {
        if frequencies.len() != amplitudes.len() {
            return Err(MeasureError::InvalidSweep(format!(
                "{} frequencies but {} amplitudes",
                frequencies.len(),
                amplitudes.len()
            )));
        }
        if let Some(f) = frequencies.iter().find(|f| !f.is_finite()) {
            return Err(MeasureError::InvalidSweep(format!(
                "non-finite frequency {f}"
            )));
        }
        if let Some(i) = frequencies.windows(2).position(|w| w[1] <= w[0]) {
            return Err(MeasureError::InvalidSweep(format!(
                "frequency not increasing at sample {}",
                i + 1
            )));
        }
        Ok(Sweep {
            frequencies,
            amplitudes,
        })
    }

    /// `points` frequencies evenly spaced over `[start_hz, end_hz]`, paired
    /// with amplitudes produced by `amplitude_at`.
    pub fn linspace(
        start_hz: f64,
        end_hz: f64,
        points: usize,
        mut amplitude_at: impl FnMut(f64) -> f64,
    ) -> MeasureResult<Self> {
        let frequencies = linspace(start_hz, end_hz, points);
        let amplitudes = frequencies.iter().map(|&f| amplitude_at(f)).collect();
        Sweep::new(frequencies, amplitudes)
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Whether the sweep holds no samples.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// `(frequency, amplitude)` pairs in frequency order.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.amplitudes.iter().copied())
    }

    /// First and last frequency, if any.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((*self.frequencies.first()?, *self.frequencies.last()?))
    }

    /// Samples whose frequency lies in `[start_hz, end_hz]`.
    pub fn slice(&self, start_hz: f64, end_hz: f64) -> Sweep {
        let lo = self.frequencies.partition_point(|&f| f < start_hz);
        let hi = self.frequencies.partition_point(|&f| f <= end_hz);
        let hi = hi.max(lo);
        Sweep {
            frequencies: self.frequencies[lo..hi].to_vec(),
            amplitudes: self.amplitudes[lo..hi].to_vec(),
        }
    }

    /// Amplitude at `frequency_hz`, linearly interpolated between the two
    /// surrounding samples. `None` outside the captured span.
    pub fn amplitude_at(&self, frequency_hz: f64) -> Option<f64> {
        let (first, last) = self.span()?;
        if frequency_hz < first || frequency_hz > last {
            return None;
        }
        let hi = self.frequencies.partition_point(|&f| f < frequency_hz);
        if self.frequencies[hi] == frequency_hz || hi == 0 {
            return Some(self.amplitudes[hi]);
        }
        let (f0, f1) = (self.frequencies[hi - 1], self.frequencies[hi]);
        let (a0, a1) = (self.amplitudes[hi - 1], self.amplitudes[hi]);
        Some(a0 + (a1 - a0) * (frequency_hz - f0) / (f1 - f0))
    }
}

/// `points` values evenly spaced over `[start, end]`, endpoints included.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Peak – a candidate found in a sweep
// ---------------------------------------------------------------------------

/// A local maximum of a [`Sweep`] that passed the prominence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Amplitude in the coarse sweep, dBm.
    pub raw_amplitude: f64,
    /// Sample index in the originating sweep.
    pub index: usize,
    /// Height above the surrounding baseline, dB.
    pub prominence: f64,
}

// ---------------------------------------------------------------------------
// MeasurementRecord – one report row
// ---------------------------------------------------------------------------

/// Whether a refined peak is the carrier itself or a spurious emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakKind {
    Carrier,
    Spurious,
}

impl fmt::Display for PeakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakKind::Carrier => write!(f, "carrier"),
            PeakKind::Spurious => write!(f, "spurious"),
        }
    }
}

/// A refined, compensated power reading. Field names match the report
/// CSV columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "measurement_index")]
    pub index: u64,
    pub timestamp: DateTime<Local>,
    #[serde(rename = "peak_type")]
    pub kind: PeakKind,
    pub note: String,
    #[serde(rename = "frequency_hz")]
    pub peak_frequency: f64,
    #[serde(rename = "measured_power_dbm")]
    pub raw_power: f64,
    #[serde(rename = "compensation_db")]
    pub compensation_used: f64,
    #[serde(rename = "corrected_power_dbm")]
    pub corrected_power: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unordered_or_mismatched_sweeps() {
        assert!(Sweep::new(vec![1.0, 2.0], vec![0.0]).is_err());
        assert!(Sweep::new(vec![1.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(Sweep::new(vec![2.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(Sweep::new(Vec::new(), Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn linspace_hits_both_ends() {
        let f = linspace(1e6, 10e6, 401);
        assert_eq!(f.len(), 401);
        assert_eq!(f[0], 1e6);
        assert_eq!(f[400], 10e6);
        assert_eq!(linspace(5.0, 9.0, 1), vec![5.0]);
    }

    #[test]
    fn slice_and_interpolate() {
        let sweep = Sweep::new(vec![10.0, 20.0, 30.0, 40.0], vec![0.0, -10.0, -20.0, -30.0]).unwrap();
        let part = sweep.slice(15.0, 30.0);
        assert_eq!(part.frequencies(), &[20.0, 30.0]);
        assert!(sweep.slice(41.0, 50.0).is_empty());

        assert_eq!(sweep.amplitude_at(10.0), Some(0.0));
        assert_eq!(sweep.amplitude_at(25.0), Some(-15.0));
        assert_eq!(sweep.amplitude_at(40.0), Some(-30.0));
        assert_eq!(sweep.amplitude_at(45.0), None);
    }
}
