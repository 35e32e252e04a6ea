use anyhow::{Result, bail};

use super::model::PeakKind;
use crate::units::format_frequency;

// ---------------------------------------------------------------------------
// Carrier / spurious classification
// ---------------------------------------------------------------------------

/// Half-width of the window around the carrier inside which a peak counts
/// as the carrier: 1 % of the carrier frequency, never less than 100 kHz.
pub fn carrier_tolerance(carrier_hz: f64) -> f64 {
    (carrier_hz * 0.01).max(100e3)
}

/// Classify a peak frequency relative to the carrier.
pub fn classify(frequency_hz: f64, carrier_hz: f64) -> PeakKind {
    if (frequency_hz - carrier_hz).abs() < carrier_tolerance(carrier_hz) {
        PeakKind::Carrier
    } else {
        PeakKind::Spurious
    }
}

// ---------------------------------------------------------------------------
// Search range
// ---------------------------------------------------------------------------

/// Upper edge of the spurious-emission search for a given carrier.
pub fn search_stop_frequency(carrier_hz: f64) -> f64 {
    if carrier_hz < 1e6 {
        10e6
    } else if carrier_hz < 10e6 {
        100e6
    } else if carrier_hz < 500e6 {
        2.5e9
    } else if carrier_hz < 3e9 {
        10e9
    } else {
        26e9
    }
}

/// Check that the carrier lies in `[min_hz, max_hz]`.
pub fn validate_carrier(carrier_hz: f64, min_hz: f64, max_hz: f64) -> Result<f64> {
    if !(min_hz..=max_hz).contains(&carrier_hz) {
        bail!(
            "carrier must be between {} and {}, got {}",
            format_frequency(min_hz),
            format_frequency(max_hz),
            format_frequency(carrier_hz)
        );
    }
    Ok(carrier_hz)
}
