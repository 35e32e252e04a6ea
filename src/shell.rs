//! Pieces shared by the command-line tools: logging setup, instrument
//! selection and line prompts.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use log::info;

use crate::config::ScenarioConfig;
use crate::instrument::{ReplayAnalyzer, SimulatedAnalyzer, SpectrumAnalyzer};
use crate::units::{format_frequency, parse_frequency};

/// Initialise `env_logger`: `RUST_LOG` wins, otherwise `info`, or `debug`
/// with `-v`, or `trace` with `-vv`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

// ---------------------------------------------------------------------------
// Instrument selection
// ---------------------------------------------------------------------------

/// Where sweeps come from.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Serve sweeps from a recorded capture (.parquet, .json or .csv)
    #[arg(long, value_name = "FILE", conflicts_with = "simulate")]
    pub replay: Option<PathBuf>,

    /// Which capture in the replay file to use
    #[arg(long, default_value_t = 0)]
    pub capture: usize,

    /// Simulate the bench described by a scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub simulate: Option<PathBuf>,
}

/// An opened instrument session.
pub enum Backend {
    Replay(ReplayAnalyzer),
    Simulated(SimulatedAnalyzer),
}

impl Backend {
    pub fn open(args: &BackendArgs) -> Result<Self> {
        let mut backend = match (&args.replay, &args.simulate) {
            (Some(path), None) => {
                let mut replay = ReplayAnalyzer::from_file(path)?;
                replay.select(args.capture)?;
                Backend::Replay(replay)
            }
            (None, Some(path)) => Backend::Simulated(SimulatedAnalyzer::new(ScenarioConfig::load(path)?)),
            _ => bail!("choose an instrument with --replay <FILE> or --simulate <FILE>"),
        };
        let id = backend
            .analyzer()
            .identity()
            .context("querying instrument identity")?;
        info!("Connected to: {id}");
        Ok(backend)
    }

    pub fn analyzer(&mut self) -> &mut dyn SpectrumAnalyzer {
        match self {
            Backend::Replay(sa) => sa,
            Backend::Simulated(sa) => sa,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Print `message` and read one trimmed line from stdin.
pub fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("input closed while waiting for a reply");
    }
    Ok(line.trim().to_string())
}

/// Prompt until the reply parses as a frequency accepted by `check`.
pub fn prompt_frequency(message: &str, check: impl Fn(f64) -> Result<f64>) -> Result<f64> {
    loop {
        let reply = prompt(message)?;
        match parse_frequency(&reply).and_then(&check) {
            Ok(hz) => return Ok(hz),
            Err(e) => println!("Invalid input: {e:#}. Try e.g. '100MHz' or '2.4g'."),
        }
    }
}

/// Frequency from a flag when given, otherwise from a prompt.
pub fn frequency_arg_or_prompt(
    arg: Option<&str>,
    message: &str,
    check: impl Fn(f64) -> Result<f64>,
) -> Result<f64> {
    match arg {
        Some(text) => parse_frequency(text).and_then(&check),
        None => prompt_frequency(message, check),
    }
}

/// `[start, end]` check used by both the calibration and stepped tools.
pub fn check_range(start_hz: f64, end_hz: f64, min_hz: f64, max_hz: f64) -> Result<()> {
    if !(min_hz <= start_hz && start_hz < end_hz && end_hz <= max_hz) {
        bail!(
            "range must satisfy {} <= start < end <= {}",
            format_frequency(min_hz),
            format_frequency(max_hz)
        );
    }
    Ok(())
}
