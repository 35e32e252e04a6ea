//! Peak detection on coarse sweeps.
//!
//! Candidates are local maxima ranked by topographic prominence; a minimum
//! frequency spacing then thins out clusters, strongest first.

use log::debug;

use crate::data::model::{Peak, Sweep};

/// Peak detection configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetector {
    /// Minimum height above the local baseline, in dB.
    min_prominence_db: f64,
    /// Minimum distance to an already accepted peak, in Hz.
    min_spacing_hz: f64,
    /// Optional cap on the number of peaks returned.
    max_peaks: Option<usize>,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self {
            min_prominence_db: 10.0,
            min_spacing_hz: 0.0,
            max_peaks: None,
        }
    }
}

impl PeakDetector {
    pub fn new(min_prominence_db: f64, min_spacing_hz: f64) -> Self {
        Self {
            min_prominence_db,
            min_spacing_hz,
            max_peaks: None,
        }
    }

    /// Keep at most `max_peaks` of the strongest peaks.
    pub fn with_max_peaks(mut self, max_peaks: usize) -> Self {
        self.max_peaks = Some(max_peaks);
        self
    }

    /// Find peaks in `sweep`, ordered by ascending frequency.
    ///
    /// A candidate survives when its prominence reaches `min_prominence_db`
    /// and no stronger (or equally strong, earlier) accepted peak lies closer
    /// than `min_spacing_hz`.
    pub fn detect(&self, sweep: &Sweep) -> Vec<Peak> {
        let freqs = sweep.frequencies();
        let mut candidates: Vec<Peak> = local_maxima(sweep.amplitudes())
            .into_iter()
            .filter(|&(_, prominence)| prominence >= self.min_prominence_db)
            .map(|(index, prominence)| Peak {
                frequency: freqs[index],
                raw_amplitude: sweep.amplitudes()[index],
                index,
                prominence,
            })
            .collect();

        // Strongest first, earlier sample wins a tie.
        candidates.sort_by(|a, b| {
            b.raw_amplitude
                .total_cmp(&a.raw_amplitude)
                .then(a.index.cmp(&b.index))
        });

        let limit = self.max_peaks.unwrap_or(usize::MAX);
        let mut accepted: Vec<Peak> = Vec::new();
        for candidate in candidates {
            if accepted.len() >= limit {
                break;
            }
            let crowded = accepted
                .iter()
                .any(|p| (p.frequency - candidate.frequency).abs() < self.min_spacing_hz);
            if crowded {
                debug!("suppressing peak at {} Hz (spacing)", candidate.frequency);
                continue;
            }
            accepted.push(candidate);
        }

        accepted.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        accepted
    }
}

/// Convenience wrapper around [`PeakDetector::detect`].
pub fn find_peaks(sweep: &Sweep, min_prominence_db: f64, min_spacing_hz: f64) -> Vec<Peak> {
    PeakDetector::new(min_prominence_db, min_spacing_hz).detect(sweep)
}

/// Interior local maxima as `(index, prominence)`. A flat top is reported
/// once, at its first sample; sweep edges are never peaks.
fn local_maxima(amplitudes: &[f64]) -> Vec<(usize, f64)> {
    let n = amplitudes.len();
    let mut maxima = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if amplitudes[i] > amplitudes[i - 1] {
            let mut end = i;
            while end + 1 < n && amplitudes[end + 1] == amplitudes[i] {
                end += 1;
            }
            if end + 1 < n && amplitudes[end + 1] < amplitudes[i] {
                maxima.push((i, prominence(amplitudes, i, end)));
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }
    maxima
}

/// Height of the plateau `start..=end` above the higher of the two lowest
/// points reached before climbing past it on either side.
fn prominence(amplitudes: &[f64], start: usize, end: usize) -> f64 {
    let height = amplitudes[start];
    let left_min = amplitudes[..start]
        .iter()
        .rev()
        .take_while(|&&a| a <= height)
        .fold(height, |min, &a| min.min(a));
    let right_min = amplitudes[end + 1..]
        .iter()
        .take_while(|&&a| a <= height)
        .fold(height, |min, &a| min.min(a));
    height - left_min.max(right_min)
}
