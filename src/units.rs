use anyhow::{Context, Result, bail};

// ---------------------------------------------------------------------------
// Frequency parsing / formatting
// ---------------------------------------------------------------------------

/// Parse a frequency such as `"100kHz"`, `"2.4g"`, `"5 MHz"` or `"1e6"` into Hz.
///
/// Suffixes are case-insensitive; a bare number (optionally ending in `hz`)
/// is taken as Hz. Spaces are ignored.
pub fn parse_frequency(text: &str) -> Result<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        bail!("empty frequency");
    }

    // Longest suffixes first so "mhz" is not read as "hz".
    const SUFFIXES: [(&str, f64); 7] = [
        ("ghz", 1e9),
        ("mhz", 1e6),
        ("khz", 1e3),
        ("hz", 1.0),
        ("g", 1e9),
        ("m", 1e6),
        ("k", 1e3),
    ];

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| cleaned.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((cleaned.as_str(), 1.0));

    let value: f64 = number
        .parse()
        .with_context(|| format!("'{text}' is not a frequency"))?;
    let hz = value * multiplier;
    if !hz.is_finite() {
        bail!("'{text}' is not a finite frequency");
    }
    Ok(hz)
}

/// Format a frequency with kHz / MHz / GHz units and roughly four
/// significant figures.
pub fn format_frequency(hz: f64) -> String {
    let (value, unit) = if hz < 1e6 {
        (hz / 1e3, "kHz")
    } else if hz < 1e9 {
        (hz / 1e6, "MHz")
    } else {
        (hz / 1e9, "GHz")
    };

    let precision = if value < 10.0 {
        3
    } else if value < 100.0 {
        2
    } else {
        1
    };
    format!("{value:.precision$} {unit}")
}

// ---------------------------------------------------------------------------
// Power formatting
// ---------------------------------------------------------------------------

/// Convert dBm to watts.
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

/// Render a dBm level as W, mW or µW.
pub fn format_watts(dbm: f64) -> String {
    let watts = dbm_to_watts(dbm);
    if watts >= 1.0 {
        format!("{watts:.2} W")
    } else if watts >= 1e-3 {
        format!("{:.2} mW", watts * 1e3)
    } else {
        format!("{:.2} µW", watts * 1e6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hz(text: &str) -> f64 {
        parse_frequency(text).unwrap()
    }

    #[test]
    fn parses_unit_suffixes() {
        assert_eq!(hz("100kHz"), 100e3);
        assert_eq!(hz("100k"), 100e3);
        assert!((hz("2.4 GHz") - 2.4e9).abs() < 1.0);
        assert!((hz("2.4g") - 2.4e9).abs() < 1.0);
        assert!((hz("433.92MHZ") - 433.92e6).abs() < 1.0);
        assert_eq!(hz("5m"), 5e6);
        assert_eq!(hz("1e6"), 1e6);
        assert_eq!(hz("50hz"), 50.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_frequency("").is_err());
        assert!(parse_frequency("fast").is_err());
        assert!(parse_frequency("12 parsecs").is_err());
    }

    #[test]
    fn formats_with_four_figures() {
        assert_eq!(format_frequency(100e3), "100.0 kHz");
        assert_eq!(format_frequency(2.4e9), "2.400 GHz");
        assert_eq!(format_frequency(433.92e6), "433.9 MHz");
        assert_eq!(format_frequency(10e6), "10.00 MHz");
    }

    #[test]
    fn formats_power_ranges() {
        assert_eq!(format_watts(30.0), "1.00 W");
        assert_eq!(format_watts(10.0), "10.00 mW");
        assert_eq!(format_watts(-40.0), "0.10 µW");
    }
}
