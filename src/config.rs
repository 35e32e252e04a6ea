use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::refine::DEFAULT_AVERAGES;
use crate::analysis::segment::{DEFAULT_MAX_RATIO, DEFAULT_POINTS_PER_SWEEP};
use crate::data::compensation::CompensationPoint;

// ---------------------------------------------------------------------------
// ScoutConfig – measurement and calibration settings
// ---------------------------------------------------------------------------

/// Settings shared by the measurement and calibration tools.
///
/// Read from a JSON file; every field is optional and falls back to its
/// default. Command-line flags are applied on top by the binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub compensation_path: PathBuf,
    pub report_path: PathBuf,

    /// Minimum peak prominence in the coarse sweep, dB.
    pub min_prominence_db: f64,
    /// Minimum distance between reported peaks, Hz.
    pub min_spacing_hz: f64,
    pub max_peaks: Option<usize>,
    /// Readings averaged per zero-span measurement.
    pub zero_span_averages: usize,

    /// Points per analyzer sweep.
    pub sweep_points: usize,
    /// Lower edge of the emission search, Hz.
    pub search_start_hz: f64,
    pub carrier_min_hz: f64,
    pub carrier_max_hz: f64,

    /// Relative window within which a new calibration point supersedes an
    /// old one (0.1 = ±10 %).
    pub merge_tolerance: f64,
    /// Largest end/start ratio of a single calibration sweep.
    pub max_ratio: f64,
    /// Tracking generator level during calibration, dBm.
    pub tracking_power_dbm: f64,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            compensation_path: PathBuf::from("ext_att_compensation.csv"),
            report_path: PathBuf::from("peak_report.csv"),
            min_prominence_db: 10.0,
            min_spacing_hz: 100e3,
            max_peaks: None,
            zero_span_averages: DEFAULT_AVERAGES,
            sweep_points: DEFAULT_POINTS_PER_SWEEP,
            search_start_hz: 100e3,
            carrier_min_hz: 100e3,
            carrier_max_hz: 11e9,
            merge_tolerance: 0.1,
            max_ratio: DEFAULT_MAX_RATIO,
            tracking_power_dbm: 0.0,
        }
    }
}

impl ScoutConfig {
    /// Load from `path`, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                let config: ScoutConfig = serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?;
                info!("Loaded settings from {}", path.display());
                config
            }
            None => ScoutConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.zero_span_averages == 0 {
            bail!("zero_span_averages must be at least 1");
        }
        if self.sweep_points < 2 {
            bail!("sweep_points must be at least 2, got {}", self.sweep_points);
        }
        if !(self.merge_tolerance >= 0.0 && self.merge_tolerance < 1.0) {
            bail!("merge_tolerance must be in [0, 1), got {}", self.merge_tolerance);
        }
        if !(self.max_ratio > 1.0) {
            bail!("max_ratio must be greater than 1, got {}", self.max_ratio);
        }
        if !(self.search_start_hz > 0.0) || self.carrier_min_hz >= self.carrier_max_hz {
            bail!("frequency limits are inconsistent");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScenarioConfig – simulated bench
// ---------------------------------------------------------------------------

/// A transmitter visible to the simulated analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub frequency_hz: f64,
    /// Level at the DUT output, before the external path, dBm.
    pub power_dbm: f64,
    /// Gaussian half-width of the displayed line, Hz.
    #[serde(default = "default_emitter_width")]
    pub width_hz: f64,
}

fn default_emitter_width() -> f64 {
    100e3
}

/// Description of the simulated bench used when no hardware is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub identity: String,
    pub noise_floor_dbm: f64,
    /// Standard deviation of the per-reading noise, dB.
    pub noise_sigma_db: f64,
    pub seed: u64,
    pub emitters: Vec<Emitter>,
    /// External path loss between DUT and analyzer (positive dB).
    pub path_loss: Vec<CompensationPoint>,
    /// Zero-span requests within `resolution_bandwidth_hz` of these
    /// frequencies time out.
    pub fail_near_hz: Vec<f64>,
    pub resolution_bandwidth_hz: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            identity: "SIMULATED 8593EM".into(),
            noise_floor_dbm: -90.0,
            noise_sigma_db: 0.5,
            seed: 42,
            emitters: Vec::new(),
            path_loss: Vec::new(),
            fail_near_hz: Vec::new(),
            resolution_bandwidth_hz: 100e3,
        }
    }
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario = serde_json::from_str(&text)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        info!("Loaded simulated bench from {}", path.display());
        Ok(scenario)
    }
}
