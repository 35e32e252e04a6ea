use thiserror::Error;

// ---------------------------------------------------------------------------
// Instrument-side failures
// ---------------------------------------------------------------------------

/// Failure reported by an instrument while capturing data.
///
/// These are scoped to the single capture that produced them: the pipelines
/// record them per peak (or per segment) and carry on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("invalid instrument response: {0}")]
    InvalidResponse(String),

    #[error("no data between {start_hz} Hz and {end_hz} Hz")]
    NoData { start_hz: f64, end_hz: f64 },
}

// ---------------------------------------------------------------------------
// Measurement / calibration failures
// ---------------------------------------------------------------------------

/// Errors raised by the measurement core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    /// Interpolation was requested on a table with no points.
    #[error("compensation table is empty")]
    EmptyTable,

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("invalid frequency range: start {start_hz} Hz, end {end_hz} Hz")]
    InvalidRange { start_hz: f64, end_hz: f64 },

    #[error("frequency must be finite, got {0}")]
    InvalidFrequency(f64),

    #[error("segment ratio must be greater than 1, got {0}")]
    InvalidRatio(f64),

    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    #[error("zero-span averaging needs at least one sample")]
    InvalidAverages,
}

pub type MeasureResult<T> = Result<T, MeasureError>;

impl MeasureError {
    /// Whether the error only affects the capture in flight.
    ///
    /// Everything else (missing compensation data, malformed ranges) is a
    /// configuration problem and ends the run.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, MeasureError::Acquisition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_convert_and_classify() {
        let err: MeasureError = AcquisitionError::Timeout {
            operation: "zero span".into(),
            after_ms: 10_000,
        }
        .into();
        assert!(err.is_acquisition());
        assert_eq!(err.to_string(), "zero span timed out after 10000 ms");
        assert!(!MeasureError::EmptyTable.is_acquisition());
    }
}
