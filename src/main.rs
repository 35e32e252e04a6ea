use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use emc_scout::analysis::RecordContext;
use emc_scout::config::ScoutConfig;
use emc_scout::data::compensation::CompensationTable;
use emc_scout::data::filter::validate_carrier;
use emc_scout::data::model::{MeasurementRecord, PeakKind};
use emc_scout::data::report::{append_records, next_measurement_index};
use emc_scout::pipeline::{self, MeasurementRun};
use emc_scout::shell::{self, Backend, BackendArgs};
use emc_scout::units::{format_frequency, format_watts};

#[derive(Parser)]
#[command(name = "emc-scout")]
#[command(version, about = "Find, refine and log compensated emission peaks", long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    backend: BackendArgs,

    /// Carrier frequency, e.g. 433.92MHz (prompted when absent)
    #[arg(long)]
    carrier: Option<String>,

    /// Free-text note stored with every row (prompted when absent)
    #[arg(long)]
    note: Option<String>,

    /// Compensation table (overrides the settings file)
    #[arg(long, value_name = "FILE")]
    compensation: Option<PathBuf>,

    /// Report CSV to append to (overrides the settings file)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Minimum peak prominence in dB
    #[arg(long)]
    min_prominence: Option<f64>,

    /// Zero-span readings averaged per peak
    #[arg(long)]
    averages: Option<usize>,

    /// Print the report without appending to the report file
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn settings(&self) -> Result<ScoutConfig> {
        let mut config = ScoutConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.compensation {
            config.compensation_path = path.clone();
        }
        if let Some(path) = &self.report {
            config.report_path = path.clone();
        }
        if let Some(db) = self.min_prominence {
            config.min_prominence_db = db;
        }
        if let Some(n) = self.averages {
            config.zero_span_averages = n;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    shell::init_logging(cli.verbose);

    let config = cli.settings()?;
    let table = CompensationTable::load_path(&config.compensation_path)
        .context("a compensation table is required; run gen-compensation first")?;
    if table.is_empty() {
        bail!(
            "{} holds no compensation points",
            config.compensation_path.display()
        );
    }

    let mut backend = Backend::open(&cli.backend)?;

    let check = |hz| validate_carrier(hz, config.carrier_min_hz, config.carrier_max_hz);
    let carrier_hz = shell::frequency_arg_or_prompt(
        cli.carrier.as_deref(),
        "Enter carrier frequency (e.g., 100kHz, 2.4GHz, 11GHz): ",
        check,
    )?;
    let (start_hz, stop_hz) = pipeline::search_range(&config, carrier_hz);
    println!("\nCarrier Frequency: {}", format_frequency(carrier_hz));
    println!(
        "Searching for spurious emissions from {} to {}",
        format_frequency(start_hz),
        format_frequency(stop_hz)
    );

    let index = next_measurement_index(&config.report_path)?;
    let context = RecordContext::new(index, carrier_hz, cli.note.clone().unwrap_or_default());
    let mut run = pipeline::measure(backend.analyzer(), &table, &config, &context)?;

    if run.records.is_empty() && run.failures.is_empty() {
        println!("No emissions of any sort in the search range were found.");
        return Ok(());
    }
    print_report(&run);

    if cli.dry_run {
        info!("Dry run, report file left untouched");
        return Ok(());
    }
    if cli.note.is_none() {
        let note = shell::prompt("Enter a note for this measurement: ")?;
        attach_note(&mut run, &note);
    }
    append_records(&config.report_path, &run.records)?;
    println!(
        "\nAppended {} peaks to {} with measurement index {index}.",
        run.records.len(),
        config.report_path.display()
    );
    Ok(())
}

/// Notes are collected after the operator has seen the results; rows are
/// not yet written at this point.
fn attach_note(run: &mut MeasurementRun, note: &str) {
    for record in &mut run.records {
        record.note = note.to_string();
    }
}

fn print_report(run: &MeasurementRun) {
    let carrier: Vec<&MeasurementRecord> = run
        .records
        .iter()
        .filter(|r| r.kind == PeakKind::Carrier)
        .collect();
    let spurious: Vec<&MeasurementRecord> = run
        .records
        .iter()
        .filter(|r| r.kind == PeakKind::Spurious)
        .collect();

    if !carrier.is_empty() {
        println!("\n--- Carrier Signal Detected ---");
        carrier.iter().for_each(|r| print_peak(r));
    }
    if !spurious.is_empty() {
        println!("\n--- Spurious Emissions Detected ---");
        spurious.iter().for_each(|r| print_peak(r));
    } else if !carrier.is_empty() {
        println!("\nNo significant spurious emissions found.");
    }

    if !run.failures.is_empty() {
        println!("\n--- Peaks Not Measured ---");
        for failure in &run.failures {
            println!(
                "  {} ({:.2} dBm in sweep): {}",
                format_frequency(failure.peak.frequency),
                failure.peak.raw_amplitude,
                failure.error
            );
        }
    }
}

fn print_peak(record: &MeasurementRecord) {
    println!(
        "  Frequency: {}, Measured Power: {:.2} dBm",
        format_frequency(record.peak_frequency),
        record.raw_power
    );
    if record.compensation_used != 0.0 {
        println!("  Compensation: {:.2} dB", record.compensation_used);
    }
    println!(
        "  Corrected Power: {:.2} dBm = {}",
        record.corrected_power,
        format_watts(record.corrected_power)
    );
}
