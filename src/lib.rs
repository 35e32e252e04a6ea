//! Spectrum-analyzer emissions measurement with external attenuation
//! compensation.
//!
//! * [`pipeline::measure`] sweeps a search range, detects peaks, refines
//!   each in zero span and returns compensated report records.
//! * [`pipeline::calibrate`] sweeps a tracking generator across segments of
//!   a range and returns points to merge into the compensation table.
//!
//! Instruments are reached through the traits in [`instrument`].

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod instrument;
pub mod pipeline;
pub mod shell;
pub mod units;

pub use error::{AcquisitionError, MeasureError, MeasureResult};
