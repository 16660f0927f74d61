mod cost_calculator;
mod error;
mod live;
mod reading_inputs;

use crate::cost_calculator::{CostEstimate, compute_fields};
use crate::live::LiveCalculator;
use crate::reading_inputs::{RecordFields, ReadingInputs, field};
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use jiff::Zoned;
use jiff::civil::Date;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Estimate a gas bill from two meter readings.
/// Converts the metered volume to kWh with the usual UK correction factors, then adds
/// the daily standing charge for every day between the two readings.
#[derive(Parser, Debug)]
#[command(version, long_about, args_conflicts_with_subcommands = true)]
struct GasEstimate {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    estimate: EstimateArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one estimate (the default).
    Estimate(EstimateArgs),
    /// Print an estimate, then read `field=value` lines from stdin and recompute after each.
    Live(EstimateArgs),
    /// Estimate every row of a CSV file whose header names the input fields.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct EstimateArgs {
    #[command(flatten)]
    inputs: InputArgs,
    /// Print the estimate as JSON.
    #[arg(long)]
    json: bool,
}

/// Every input is optional on the command line; missing ones fall back to the
/// usual values for last month's bill.
#[derive(Args, Debug)]
struct InputArgs {
    /// Previous meter reading [default: 9170].
    #[arg(long, env = "PREVIOUS_READING", allow_hyphen_values = true)]
    previous_reading: Option<String>,
    /// Current meter reading [default: 9227].
    #[arg(long, env = "CURRENT_READING", allow_hyphen_values = true)]
    current_reading: Option<String>,
    /// Volume correction factor [default: 1.02264].
    #[arg(long, env = "VCF")]
    vcf: Option<String>,
    /// Kilowatt conversion factor [default: 3.6].
    #[arg(long, env = "KWCF")]
    kwcf: Option<String>,
    /// Daily standing charge, in pounds per day [default: 0.160912].
    #[arg(long, env = "DAILY_STANDING_CHARGE")]
    daily_standing_charge: Option<String>,
    /// Unit price, in pounds per kWh [default: 0.133153].
    #[arg(long, env = "COST_PER_KW")]
    cost_per_kw: Option<String>,
    /// Date of the previous reading, as YYYY-MM-DD [default: first day of last month].
    #[arg(long, env = "START_DATE")]
    start_date: Option<String>,
    /// Date of the current reading, as YYYY-MM-DD [default: first day of this month].
    #[arg(long, env = "END_DATE")]
    end_date: Option<String>,
}

impl InputArgs {
    fn to_fields(&self, today: Date) -> BTreeMap<String, String> {
        let mut fields = ReadingInputs::defaults(today).to_fields();
        let overrides = [
            (field::PREVIOUS_READING, &self.previous_reading),
            (field::CURRENT_READING, &self.current_reading),
            (field::VCF, &self.vcf),
            (field::KWCF, &self.kwcf),
            (field::DAILY_STANDING_CHARGE, &self.daily_standing_charge),
            (field::COST_PER_KW, &self.cost_per_kw),
            (field::START_DATE, &self.start_date),
            (field::END_DATE, &self.end_date),
        ];
        for (name, value) in overrides {
            if let Some(value) = value {
                fields.insert(name.to_string(), value.clone());
            }
        }
        fields
    }
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// CSV file with one reading period per row.
    /// The header row must name the fields: previousReading, currentReading, vcf, kwcf,
    /// dailyStandingCharge, startDate, endDate, costPerKW.
    #[arg(long_help)]
    readings_csv: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = GasEstimate::parse();
    let today = Zoned::now().date();

    match args.command {
        None => estimate(&args.estimate, today),
        Some(Command::Estimate(args)) => estimate(&args, today),
        Some(Command::Live(args)) => live(&args, today),
        Some(Command::Batch(args)) => batch(&args.readings_csv),
    }
}

fn print_estimate(estimate: &CostEstimate, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(estimate)?);
    } else {
        println!("{estimate}");
    }
    Ok(())
}

fn estimate(args: &EstimateArgs, today: Date) -> anyhow::Result<()> {
    let estimate = compute_fields(&args.inputs.to_fields(today))?;
    print_estimate(&estimate, args.json)
}

fn live(args: &EstimateArgs, today: Date) -> anyhow::Result<()> {
    let mut calculator = LiveCalculator::new(args.inputs.to_fields(today));
    match calculator.latest() {
        Ok(estimate) => print_estimate(estimate, args.json)?,
        Err(error) => eprintln!("{error}"),
    }
    info!("Reading `field=value` lines from stdin");

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        match calculator.apply_line(&line) {
            Ok(Ok(estimate)) => print_estimate(estimate, args.json)?,
            Ok(Err(error)) => eprintln!("{error}"),
            Err(error) => eprintln!("{error}"),
        }
    }
    Ok(())
}

fn batch(readings_csv: &Path) -> anyhow::Result<()> {
    let file = File::open(readings_csv)
        .with_context(|| format!("Readings file not found: {}", readings_csv.display()))?;
    estimate_rows(BufReader::new(file), io::stdout().lock())
}

/// Write one estimate row per readings row. Rows that fail are logged and skipped.
fn estimate_rows(readings: impl Read, output: impl Write) -> anyhow::Result<()> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(readings);
    let headers = csv_reader.headers().context("CSV headers not found")?.clone();
    let mut csv_writer = csv::Writer::from_writer(output);

    let mut n_rows = 0_usize;
    let mut n_failed = 0_usize;
    for record in csv_reader.records() {
        let record = record.context("Readings file could not be deserialized")?;
        n_rows += 1;
        let line = record.position().map_or(0, csv::Position::line);
        let fields = RecordFields {
            headers: &headers,
            record: &record,
        };
        match compute_fields(&fields) {
            Ok(estimate) => csv_writer.serialize(&estimate)?,
            Err(error) => {
                n_failed += 1;
                warn!(line, field = error.field(), %error, "Skipping row");
            }
        }
    }
    csv_writer.flush()?;
    info!(n_rows, n_failed, "Estimated readings");

    if n_failed != 0 {
        bail!("{n_failed} of {n_rows} rows could not be estimated");
    }
    Ok(())
}
