use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use emc_scout::analysis::{StepPlan, plan_frequencies};
use emc_scout::config::ScenarioConfig;
use emc_scout::instrument::{SimulatedAnalyzer, SpectrumAnalyzer};
use emc_scout::pipeline;
use emc_scout::shell;
use emc_scout::units::{format_frequency, parse_frequency};

/// Tune a CW source point by point and read the analyzer in zero span at
/// each frequency.
#[derive(Parser)]
#[command(name = "stepped-sweep")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Simulated bench providing the analyzer and the source
    #[arg(long, value_name = "FILE")]
    simulate: PathBuf,

    /// Start frequency, e.g. 10MHz
    #[arg(long)]
    start: String,

    /// End frequency, e.g. 1GHz
    #[arg(long)]
    end: String,

    /// Evenly spaced points; without it a 1000-point Halton plan is used
    #[arg(long)]
    points: Option<usize>,

    /// Source level, dBm
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    power: f64,

    /// Zero-span readings averaged per point
    #[arg(long, default_value_t = 1)]
    averages: usize,

    /// Write `frequency,power` rows to this CSV file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    shell::init_logging(cli.verbose);

    let start_hz = parse_frequency(&cli.start)?;
    let end_hz = parse_frequency(&cli.end)?;
    let plan = cli.points.map_or_else(StepPlan::default, StepPlan::Linear);
    let frequencies = plan_frequencies(start_hz, end_hz, plan)?;
    info!(
        "Stepping {} points from {} to {}",
        frequencies.len(),
        format_frequency(start_hz),
        format_frequency(end_hz)
    );

    let mut sa = SimulatedAnalyzer::new(ScenarioConfig::load(&cli.simulate)?);
    let id = sa.identity().context("querying instrument identity")?;
    info!("Connected to: {id}");
    let mut source = sa.source();

    let results = pipeline::stepped_sweep(&mut sa, &mut source, &frequencies, cli.power, cli.averages)?;

    match &cli.output {
        Some(path) => {
            write_results(path, &results)?;
            println!("Wrote {} points to {}", results.len(), path.display());
        }
        None => {
            for (f, p) in &results {
                println!("{f:.0},{p:.2}");
            }
        }
    }
    Ok(())
}

fn write_results(path: &Path, results: &[(f64, f64)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Frequency (Hz)", "Power (dBm)"])?;
    for (frequency, power) in results {
        writer.write_record([format!("{frequency:.0}"), format!("{power:.2}")])?;
    }
    writer.flush()?;
    Ok(())
}
