//! Instrument control seams.
//!
//! The measurement core only needs two capabilities from an analyzer: a
//! swept capture and a zero-span power reading. Calibration additionally
//! drives the analyzer's tracking generator, and stepped sweeps tune an
//! external CW source. Transport (GPIB or otherwise) lives behind these
//! traits.
//!
//! Every call blocks until the instrument answers. A session is owned by one
//! caller at a time, which the `&mut self` receivers enforce.

pub mod replay;
pub mod sim;

use crate::data::model::Sweep;
use crate::error::AcquisitionError;

pub use replay::ReplayAnalyzer;
pub use sim::{SimulatedAnalyzer, SimulatedSource};

/// Result type for instrument operations.
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

/// Swept and zero-span power measurements.
pub trait SpectrumAnalyzer {
    /// Identification string reported by the instrument.
    fn identity(&mut self) -> AcquisitionResult<String>;

    /// Sweep `[start_hz, end_hz]` and return `points` samples.
    fn capture_sweep(&mut self, start_hz: f64, end_hz: f64, points: usize) -> AcquisitionResult<Sweep>;

    /// Fixed-frequency capture at `center_hz`, averaged over `averages`
    /// readings. Returns power in dBm.
    fn capture_zero_span(&mut self, center_hz: f64, averages: usize) -> AcquisitionResult<f64>;
}

/// Analyzer with a built-in tracking generator.
pub trait TrackingGenerator: SpectrumAnalyzer {
    /// Set the generator output level, or switch it off with `None`.
    fn set_source_power(&mut self, power_dbm: Option<f64>) -> AcquisitionResult<()>;
}

/// Standalone CW signal generator.
pub trait SignalSource {
    fn set_frequency(&mut self, frequency_hz: f64) -> AcquisitionResult<()>;

    fn set_power(&mut self, power_dbm: f64) -> AcquisitionResult<()>;

    fn enable_rf(&mut self, enabled: bool) -> AcquisitionResult<()>;
}
