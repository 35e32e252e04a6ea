use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use emc_scout::config::{Emitter, ScenarioConfig};
use emc_scout::data::compensation::CompensationPoint;
use emc_scout::data::loader::{Capture, write_parquet};
use emc_scout::instrument::{SimulatedAnalyzer, SpectrumAnalyzer};
use emc_scout::shell;

/// Write a parquet file of synthetic sweeps for `emc-scout --replay`.
#[derive(Parser)]
#[command(name = "generate-sample")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output file
    #[arg(short, long, default_value = "sample_sweeps.parquet")]
    output: PathBuf,

    /// Points per sweep
    #[arg(long, default_value_t = 4001)]
    points: usize,

    /// Noise seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn emitter(frequency_hz: f64, power_dbm: f64) -> Emitter {
    Emitter {
        frequency_hz,
        power_dbm,
        width_hz: 500e3,
    }
}

/// A 433.92 MHz transmitter with harmonics and a few spurs, seen through a
/// cable whose loss rises with frequency.
fn demo_bench(seed: u64) -> ScenarioConfig {
    ScenarioConfig {
        identity: "SIMULATED 8593EM (sample generator)".into(),
        seed,
        emitters: vec![
            emitter(433.92e6, -5.0),
            emitter(867.84e6, -42.0),
            emitter(1301.76e6, -55.0),
            emitter(1735.68e6, -63.0),
            emitter(27.12e6, -58.0),
            emitter(216.96e6, -61.0),
        ],
        path_loss: vec![
            CompensationPoint::new(100e3, 0.4),
            CompensationPoint::new(100e6, 1.5),
            CompensationPoint::new(1e9, 4.8),
            CompensationPoint::new(2.5e9, 8.2),
        ],
        ..ScenarioConfig::default()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    shell::init_logging(cli.verbose);

    let mut sa = SimulatedAnalyzer::new(demo_bench(cli.seed));
    let ranges = [
        ("full search", 100e3, 2.5e9),
        ("carrier region", 400e6, 470e6),
        ("harmonics", 800e6, 1.8e9),
    ];

    let mut captures = Vec::with_capacity(ranges.len());
    for (label, start_hz, end_hz) in ranges {
        let sweep = sa.capture_sweep(start_hz, end_hz, cli.points)?;
        captures.push(Capture {
            sweep,
            label: Some(label.to_string()),
        });
    }
    write_parquet(&cli.output, &captures)?;

    println!(
        "Wrote {} sweeps ({} points each) to {}",
        captures.len(),
        cli.points,
        cli.output.display()
    );
    Ok(())
}
