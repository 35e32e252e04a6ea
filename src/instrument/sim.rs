use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use super::{AcquisitionResult, SignalSource, SpectrumAnalyzer, TrackingGenerator};
use crate::config::ScenarioConfig;
use crate::data::compensation::CompensationTable;
use crate::data::model::Sweep;
use crate::error::AcquisitionError;

/// Reported timeout for injected zero-span failures, matching a typical
/// 10 s instrument I/O timeout.
const SIMULATED_TIMEOUT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Deterministic noise
// ---------------------------------------------------------------------------

/// Minimal deterministic PRNG (xoshiro256**)
#[derive(Debug, Clone)]
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// CW source shared with the analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct CwState {
    frequency_hz: f64,
    power_dbm: f64,
    enabled: bool,
}

/// CW generator wired to a [`SimulatedAnalyzer`] through the scenario's
/// external path.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    state: Rc<RefCell<CwState>>,
}

impl SignalSource for SimulatedSource {
    fn set_frequency(&mut self, frequency_hz: f64) -> AcquisitionResult<()> {
        debug!("SIM SOURCE: CW {frequency_hz} HZ");
        self.state.borrow_mut().frequency_hz = frequency_hz;
        Ok(())
    }

    fn set_power(&mut self, power_dbm: f64) -> AcquisitionResult<()> {
        debug!("SIM SOURCE: PL {power_dbm:.2} DB");
        self.state.borrow_mut().power_dbm = power_dbm;
        Ok(())
    }

    fn enable_rf(&mut self, enabled: bool) -> AcquisitionResult<()> {
        debug!("SIM SOURCE: RF{}", u8::from(enabled));
        self.state.borrow_mut().enabled = enabled;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimulatedAnalyzer
// ---------------------------------------------------------------------------

/// Software stand-in for a spectrum analyzer with a tracking generator.
///
/// Emitters are drawn as Gaussian lines on top of the noise floor, all
/// attenuated by the scenario's path loss. The same seed always yields the
/// same readings.
#[derive(Debug)]
pub struct SimulatedAnalyzer {
    scenario: ScenarioConfig,
    path: CompensationTable,
    rng: SimpleRng,
    tracking_dbm: Option<f64>,
    cw: Rc<RefCell<CwState>>,
}

impl SimulatedAnalyzer {
    pub fn new(scenario: ScenarioConfig) -> Self {
        let path = CompensationTable::from_points(scenario.path_loss.iter().copied());
        let rng = SimpleRng::new(scenario.seed);
        Self {
            scenario,
            path,
            rng,
            tracking_dbm: None,
            cw: Rc::new(RefCell::new(CwState::default())),
        }
    }

    /// Handle to the CW generator connected to this analyzer's input.
    pub fn source(&self) -> SimulatedSource {
        SimulatedSource {
            state: Rc::clone(&self.cw),
        }
    }

    /// External loss at `frequency_hz`; zero when the scenario has no path.
    pub fn path_loss(&self, frequency_hz: f64) -> f64 {
        self.path.interpolate(frequency_hz).unwrap_or(0.0)
    }

    /// Noise-free level at `frequency_hz`, dBm.
    pub fn expected_level(&self, frequency_hz: f64) -> f64 {
        let mut milliwatts = dbm_to_mw(self.scenario.noise_floor_dbm);
        for emitter in &self.scenario.emitters {
            let shape = line_shape(frequency_hz - emitter.frequency_hz, emitter.width_hz);
            milliwatts += dbm_to_mw(emitter.power_dbm - self.path_loss(emitter.frequency_hz)) * shape;
        }
        if let Some(source) = self.tracking_dbm {
            milliwatts += dbm_to_mw(source - self.path_loss(frequency_hz));
        }
        let cw = *self.cw.borrow();
        if cw.enabled {
            let shape = line_shape(frequency_hz - cw.frequency_hz, self.scenario.resolution_bandwidth_hz);
            milliwatts += dbm_to_mw(cw.power_dbm - self.path_loss(cw.frequency_hz)) * shape;
        }
        10.0 * milliwatts.log10()
    }

    fn reading(&mut self, frequency_hz: f64) -> f64 {
        let level = self.expected_level(frequency_hz);
        self.rng.gauss(level, self.scenario.noise_sigma_db)
    }
}

impl SpectrumAnalyzer for SimulatedAnalyzer {
    fn identity(&mut self) -> AcquisitionResult<String> {
        debug!("SIM QUERY 'ID?': {}", self.scenario.identity);
        Ok(self.scenario.identity.clone())
    }

    fn capture_sweep(&mut self, start_hz: f64, end_hz: f64, points: usize) -> AcquisitionResult<Sweep> {
        debug!("SIM WRITE: FA {start_hz}Hz; FB {end_hz}Hz; TS ({points} points)");
        if points < 2 || !(end_hz > start_hz) {
            return Err(AcquisitionError::InvalidResponse(format!(
                "cannot sweep {start_hz} Hz .. {end_hz} Hz with {points} points"
            )));
        }
        Sweep::linspace(start_hz, end_hz, points, |f| self.reading(f))
            .map_err(|e| AcquisitionError::InvalidResponse(e.to_string()))
    }

    fn capture_zero_span(&mut self, center_hz: f64, averages: usize) -> AcquisitionResult<f64> {
        debug!("SIM WRITE: CF {center_hz}Hz; SP 0Hz; VAVG {averages}");
        if averages == 0 {
            return Err(AcquisitionError::InvalidResponse("zero averages".into()));
        }
        let rbw = self.scenario.resolution_bandwidth_hz;
        if self
            .scenario
            .fail_near_hz
            .iter()
            .any(|f| (f - center_hz).abs() <= rbw)
        {
            return Err(AcquisitionError::Timeout {
                operation: format!("zero span at {center_hz} Hz"),
                after_ms: SIMULATED_TIMEOUT_MS,
            });
        }
        let total: f64 = (0..averages).map(|_| self.reading(center_hz)).sum();
        Ok(total / averages as f64)
    }
}

impl TrackingGenerator for SimulatedAnalyzer {
    fn set_source_power(&mut self, power_dbm: Option<f64>) -> AcquisitionResult<()> {
        match power_dbm {
            Some(level) => debug!("SIM WRITE: SRCPWR {level}DB"),
            None => debug!("SIM WRITE: SRCPWR OFF"),
        }
        self.tracking_dbm = power_dbm;
        Ok(())
    }
}

fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

fn line_shape(offset_hz: f64, width_hz: f64) -> f64 {
    if width_hz <= 0.0 {
        return if offset_hz == 0.0 { 1.0 } else { 0.0 };
    }
    (-(offset_hz * offset_hz) / (2.0 * width_hz * width_hz)).exp()
}
