//! Splitting a calibration range into sub-sweeps.
//!
//! The analyzer returns a fixed number of points per sweep, so a wide sweep
//! over a large frequency ratio leaves the low end badly under-sampled.
//! Capping each sweep's end/start ratio keeps the resolution usable.

use crate::error::{MeasureError, MeasureResult};

pub const DEFAULT_MAX_RATIO: f64 = 10.0;
pub const DEFAULT_POINTS_PER_SWEEP: usize = 401;

/// Relative slack when comparing a segment's reach with the range end.
const RATIO_EPSILON: f64 = 1e-9;

/// One sub-sweep of a calibration range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start_hz: f64,
    pub end_hz: f64,
    /// Measurement points the analyzer takes over this segment.
    pub points: usize,
}

impl Segment {
    pub fn ratio(&self) -> f64 {
        self.end_hz / self.start_hz
    }
}

/// Partition `[start_hz, end_hz]` into the fewest contiguous segments whose
/// end/start ratio stays within `max_ratio`.
///
/// Segments share boundary frequencies and nothing else; the first starts at
/// `start_hz` and the last ends exactly at `end_hz`.
pub fn plan_segments(
    start_hz: f64,
    end_hz: f64,
    max_ratio: f64,
    points_per_sweep: usize,
) -> MeasureResult<Vec<Segment>> {
    if !(start_hz > 0.0) || !end_hz.is_finite() || end_hz <= start_hz {
        return Err(MeasureError::InvalidRange { start_hz, end_hz });
    }
    if !(max_ratio > 1.0) || !max_ratio.is_finite() {
        return Err(MeasureError::InvalidRatio(max_ratio));
    }

    let mut segments = Vec::new();
    let mut current = start_hz;
    while current < end_hz {
        // Every segment but the last spans the full ratio. A product that
        // lands within rounding of the end is the end.
        let reach = current * max_ratio;
        let next = if end_hz <= reach * (1.0 + RATIO_EPSILON) {
            end_hz
        } else {
            reach
        };
        segments.push(Segment {
            start_hz: current,
            end_hz: next,
            points: points_per_sweep,
        });
        current = next;
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_range_is_one_segment() {
        let segs = plan_segments(100e6, 1e9, 10.0, 401).unwrap();
        assert_eq!(
            segs,
            vec![Segment {
                start_hz: 100e6,
                end_hz: 1e9,
                points: 401
            }]
        );
    }

    #[test]
    fn one_to_fifty_megahertz() {
        let segs = plan_segments(1e6, 50e6, 10.0, 401).unwrap();
        assert!(segs.len() >= 2);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].start_hz, 1e6);
        assert_eq!(segs[0].end_hz, 10e6);
        assert_eq!(segs.last().unwrap().end_hz, 50e6);
        for seg in &segs {
            assert!(seg.ratio() <= 10.0 * (1.0 + 1e-12));
        }
    }

    #[test]
    fn segments_tile_the_range_exactly() {
        for &(start, end, ratio) in &[
            (100e3, 11e9, 10.0),
            (123.4e3, 9.87e9, 3.0),
            (1e6, 1.000001e6, 10.0),
            (2e6, 2e9, 10.0),
        ] {
            let segs = plan_segments(start, end, ratio, 101).unwrap();
            assert_eq!(segs[0].start_hz, start);
            assert_eq!(segs.last().unwrap().end_hz, end);
            for pair in segs.windows(2) {
                assert_eq!(pair[0].end_hz, pair[1].start_hz);
            }
            for seg in &segs {
                assert!(seg.end_hz > seg.start_hz);
                assert!(seg.ratio() <= ratio * (1.0 + 1e-6));
            }
            let minimum = ((end / start).ln() / ratio.ln() - 1e-9).ceil().max(1.0) as usize;
            assert_eq!(segs.len(), minimum);
        }
    }

    #[test]
    fn rounding_never_adds_a_sliver_segment() {
        let start = 1234.5;
        let end = start * 1.1 * 1.1 * 1.1;
        let segs = plan_segments(start, end, 1.1, 401).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[2].end_hz, end);
        assert!(segs[2].ratio() > 1.09);

        for k in 1..=40u32 {
            let ratio = 1.0 + f64::from(k) * 0.2;
            for n in 1..=6 {
                let end = 3.3e4 * ratio.powi(n);
                let segs = plan_segments(3.3e4, end, ratio, 11).unwrap();
                assert_eq!(segs.len(), n as usize, "ratio {ratio}, {n} steps");
            }
        }
    }

    #[test]
    fn exact_decades_do_not_leave_a_sliver() {
        let segs = plan_segments(1e6, 1e9, 10.0, 401).unwrap();
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(matches!(
            plan_segments(0.0, 1e6, 10.0, 401),
            Err(MeasureError::InvalidRange { .. })
        ));
        assert!(matches!(
            plan_segments(-5.0, 1e6, 10.0, 401),
            Err(MeasureError::InvalidRange { .. })
        ));
        assert!(matches!(
            plan_segments(2e6, 1e6, 10.0, 401),
            Err(MeasureError::InvalidRange { .. })
        ));
        assert!(matches!(
            plan_segments(1e6, 1e6, 10.0, 401),
            Err(MeasureError::InvalidRange { .. })
        ));
        assert_eq!(
            plan_segments(1e6, 1e9, 1.0, 401),
            Err(MeasureError::InvalidRatio(1.0))
        );
    }
}
