//! Frequency plans for stepped (source-tuned) sweeps.

use crate::data::model::linspace;
use crate::error::{MeasureError, MeasureResult};

/// How the frequencies of a stepped sweep are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    /// `n` evenly spaced points, ends included.
    Linear(usize),
    /// Both ends plus `n` points of the base-2 Halton sequence. Any prefix
    /// covers the range evenly, so an interrupted run is still useful.
    Halton(usize),
}

impl Default for StepPlan {
    fn default() -> Self {
        StepPlan::Halton(1000)
    }
}

/// The `index`-th element of the van der Corput / Halton sequence in `base`.
pub fn halton(mut index: u64, base: u64) -> f64 {
    let mut result = 0.0;
    let mut f = 1.0;
    while index > 0 {
        f /= base as f64;
        result += f * (index % base) as f64;
        index /= base;
    }
    result
}

/// Frequencies to visit, in measurement order.
pub fn plan_frequencies(start_hz: f64, end_hz: f64, plan: StepPlan) -> MeasureResult<Vec<f64>> {
    if !start_hz.is_finite() || !end_hz.is_finite() || end_hz <= start_hz || start_hz < 0.0 {
        return Err(MeasureError::InvalidRange { start_hz, end_hz });
    }
    let span = end_hz - start_hz;
    Ok(match plan {
        StepPlan::Linear(n) => linspace(start_hz, end_hz, n),
        StepPlan::Halton(n) => std::iter::once(start_hz)
            .chain((1..=n as u64).map(|i| start_hz + span * halton(i, 2)))
            .chain(std::iter::once(end_hz))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halton_base_two_prefix() {
        let seq: Vec<f64> = (1..=7).map(|i| halton(i, 2)).collect();
        assert_eq!(seq, vec![0.5, 0.25, 0.75, 0.125, 0.625, 0.375, 0.875]);
        assert_eq!(halton(0, 2), 0.0);
    }

    #[test]
    fn halton_plan_includes_both_ends() {
        let freqs = plan_frequencies(100e6, 200e6, StepPlan::Halton(3)).unwrap();
        assert_eq!(freqs, vec![100e6, 150e6, 125e6, 175e6, 200e6]);
    }

    #[test]
    fn linear_plan() {
        let freqs = plan_frequencies(1e6, 5e6, StepPlan::Linear(5)).unwrap();
        assert_eq!(freqs, vec![1e6, 2e6, 3e6, 4e6, 5e6]);
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(plan_frequencies(5e6, 1e6, StepPlan::Linear(5)).is_err());
    }
}
