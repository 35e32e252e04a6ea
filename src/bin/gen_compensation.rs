use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use log::info;

use emc_scout::config::{ScenarioConfig, ScoutConfig};
use emc_scout::instrument::{SimulatedAnalyzer, SpectrumAnalyzer};
use emc_scout::pipeline;
use emc_scout::shell;
use emc_scout::units::format_frequency;

/// Characterise the external attenuation path with the analyzer's tracking
/// generator and merge the result into the compensation table.
#[derive(Parser)]
#[command(name = "gen-compensation")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulated bench with a tracking generator
    #[arg(long, value_name = "FILE")]
    simulate: PathBuf,

    /// Start frequency, e.g. 1MHz (prompted when absent)
    #[arg(long)]
    start: Option<String>,

    /// End frequency, e.g. 3GHz (prompted when absent)
    #[arg(long)]
    end: Option<String>,

    /// Compensation table to update (overrides the settings file)
    #[arg(long, value_name = "FILE")]
    compensation: Option<PathBuf>,

    /// Relative merge window, 0.1 = ±10 %
    #[arg(long)]
    tolerance: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    shell::init_logging(cli.verbose);

    let mut config = ScoutConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.compensation {
        config.compensation_path = path.clone();
    }
    if let Some(tolerance) = cli.tolerance {
        config.merge_tolerance = tolerance;
    }
    config.validate()?;

    let mut sa = SimulatedAnalyzer::new(ScenarioConfig::load(&cli.simulate)?);
    let id = sa.identity().context("querying instrument identity")?;
    info!("Connected to: {id}");

    let (min_hz, max_hz) = (config.carrier_min_hz, config.carrier_max_hz);
    let in_limits = |hz: f64| {
        ensure!(
            (min_hz..=max_hz).contains(&hz),
            "frequency must be between {} and {}",
            format_frequency(min_hz),
            format_frequency(max_hz)
        );
        Ok(hz)
    };
    let start_hz = shell::frequency_arg_or_prompt(
        cli.start.as_deref(),
        "Enter start frequency (e.g., 100kHz, 1MHz): ",
        in_limits,
    )?;
    let end_hz = shell::frequency_arg_or_prompt(
        cli.end.as_deref(),
        "Enter end frequency (e.g., 1GHz, 11GHz): ",
        in_limits,
    )?;
    shell::check_range(start_hz, end_hz, min_hz, max_hz)?;

    let run = pipeline::calibrate(&mut sa, start_hz, end_hz, &config)?;
    let table = run.update_table(&config.compensation_path, config.merge_tolerance)?;

    println!(
        "\nMeasured {} points from {} to {}.",
        run.points.len(),
        format_frequency(start_hz),
        format_frequency(end_hz)
    );
    if let Some((min, max)) = run.extremes() {
        println!(
            "Minimum attenuation: {:.2} dB at {}",
            min.attenuation,
            format_frequency(min.frequency)
        );
        println!(
            "Maximum attenuation: {:.2} dB at {}",
            max.attenuation,
            format_frequency(max.frequency)
        );
    }
    for failure in &run.failures {
        println!(
            "Sub-range {} to {} skipped: {}",
            format_frequency(failure.segment.start_hz),
            format_frequency(failure.segment.end_hz),
            failure.error
        );
    }
    match table {
        Some(table) => println!(
            "{} now holds {} points.",
            config.compensation_path.display(),
            table.len()
        ),
        None => println!(
            "No points were measured; {} was not written.",
            config.compensation_path.display()
        ),
    }
    Ok(())
}
