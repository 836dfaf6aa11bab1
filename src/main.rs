//! Balance Forecast CLI
//!
//! Command-line interface for running forecasts, what-if scenarios and
//! anomaly detection over CSV exports of a single ledger

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use balance_forecast::{
    ledger::{load_recurring, load_scenarios, load_transactions},
    Anomaly, AnomalyDetector, BaselineEstimator, EngineConfig, ForecastPoint, ForecastProjector, ForecastRun,
    Horizon, ScenarioSimulator,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};

/// Cash-flow forecasting and spending anomaly detection
#[derive(Parser, Debug)]
#[command(name = "balance-forecast", author, version, about)]
struct Cli {
    /// JSON engine configuration (defaults apply for anything omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Project the balance forward
    Forecast(ForecastArgs),

    /// Project, then overlay what-if purchases
    Simulate {
        #[command(flatten)]
        forecast: ForecastArgs,

        /// Scenario CSV (id,name,amount,date,kind,installment_count)
        #[arg(long)]
        scenarios: PathBuf,
    },

    /// Flag unusual spending in the transaction history
    Detect {
        /// Transaction CSV
        #[arg(long)]
        transactions: PathBuf,

        /// Detection date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Args, Debug)]
struct ForecastArgs {
    /// Current balance
    #[arg(long)]
    balance: f64,

    /// Transaction CSV used for the spending baseline
    #[arg(long)]
    transactions: Option<PathBuf>,

    /// Recurring transaction CSV
    #[arg(long)]
    recurring: Option<PathBuf>,

    /// Horizon in days (30, 60 or 90; defaults to the configured horizon)
    #[arg(long)]
    days: Option<i64>,

    /// Forecast start date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Ignore recurring transactions
    #[arg(long)]
    no_recurring: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    match cli.command {
        Command::Forecast(args) => {
            let run = run_forecast(&config, &args)?;
            write_forecast(&mut out, cli.format, &run)?;
        }
        Command::Simulate { forecast, scenarios } => {
            let run = run_forecast(&config, &forecast)?;
            let scenarios = load_scenarios(&scenarios)
                .with_context(|| format!("failed to load scenarios {}", scenarios.display()))?;
            let outcome = ScenarioSimulator::new(config.scenario.clone()).simulate(&run.points, &scenarios)?;
            info!("simulated {} scenarios", scenarios.len());

            match cli.format {
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut out, &outcome)?;
                    writeln!(out)?;
                }
                OutputFormat::Csv => {
                    writeln!(out, "Date,Original,WithScenarios")?;
                    for row in outcome.comparison() {
                        writeln!(out, "{},{:.2},{:.2}", row.date, row.original, row.with_scenarios)?;
                    }
                }
                OutputFormat::Table => {
                    writeln!(out, "{:>10} {:>14} {:>14}", "Date", "Original", "With Scenarios")?;
                    writeln!(out, "{}", "-".repeat(40))?;
                    for row in outcome.comparison() {
                        writeln!(out, "{:>10} {:>14.2} {:>14.2}", row.date, row.original, row.with_scenarios)?;
                    }
                    let impact = &outcome.impact;
                    writeln!(out, "\nScenario Impact:")?;
                    writeln!(out, "  Base Min Balance:     ${:.2}", impact.base_min_balance)?;
                    writeln!(out, "  Scenario Min Balance: ${:.2}", impact.scenario_min_balance)?;
                    writeln!(out, "  Impact:               ${:.2}", impact.impact)?;
                    writeln!(out, "  Goes Negative:        {}", impact.goes_negative)?;
                }
            }
        }
        Command::Detect { transactions, today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let history = load_transactions(&transactions)
                .with_context(|| format!("failed to load transactions {}", transactions.display()))?;
            let anomalies = AnomalyDetector::new(config.anomaly.clone()).detect(&history, today);
            write_anomalies(&mut out, cli.format, &anomalies)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn run_forecast(config: &EngineConfig, args: &ForecastArgs) -> Result<ForecastRun> {
    let today = args.today.unwrap_or_else(|| chrono::Local::now().date_naive());

    let transactions = match &args.transactions {
        Some(path) => load_transactions(path)
            .with_context(|| format!("failed to load transactions {}", path.display()))?,
        None => Vec::new(),
    };
    let recurring = match &args.recurring {
        Some(path) => load_recurring(path)
            .with_context(|| format!("failed to load recurring transactions {}", path.display()))?,
        None => Vec::new(),
    };
    info!(
        "loaded {} transactions and {} recurring definitions",
        transactions.len(),
        recurring.len()
    );
    for r in recurring.iter().filter(|r| r.is_active) {
        debug!(
            "recurring {} ({}): {} {:.2} {} from {}",
            r.id,
            r.description,
            r.transaction_type.as_str(),
            r.amount,
            r.frequency.as_str(),
            r.next_execution_date
        );
    }

    let mut forecast = config.forecast.clone();
    if let Some(days) = args.days {
        forecast.horizon = Horizon::try_from(days)?;
    }
    if args.no_recurring {
        forecast.include_recurring = false;
    }

    balance_forecast::service::validate_amounts(&transactions, &recurring)?;
    let baseline = BaselineEstimator::new(config.baseline.clone()).daily_baseline(&transactions, today);
    Ok(ForecastProjector::new(forecast).project(args.balance, today, &recurring, baseline)?)
}

fn write_forecast(out: &mut dyn Write, format: OutputFormat, run: &ForecastRun) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "baseline": run.baseline,
                "summary": run.summary(),
                "points": run.points,
            });
            serde_json::to_writer_pretty(&mut *out, &body)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "Date,ProjectedBalance,Confidence,Income,Expenses,Recurring")?;
            for p in &run.points {
                write_point_csv(out, p)?;
            }
        }
        OutputFormat::Table => {
            if let (Some(start), Some(end)) = (run.start_date(), run.end_date()) {
                writeln!(out, "Forecast {} to {}:", start, end)?;
            }
            writeln!(out, "Horizon {} days, baseline ${:.2}/weekday", run.horizon.days(), run.baseline)?;
            writeln!(
                out,
                "{:>10} {:>14} {:>6} {:>10} {:>10} {:>10}",
                "Date", "Balance", "Conf", "Income", "Expenses", "Recurring"
            )?;
            writeln!(out, "{}", "-".repeat(66))?;
            for p in &run.points {
                writeln!(
                    out,
                    "{:>10} {:>14.2} {:>6.3} {:>10.2} {:>10.2} {:>10.2}",
                    p.date,
                    p.projected_balance,
                    p.confidence,
                    p.breakdown.income,
                    p.breakdown.expenses,
                    p.breakdown.recurring,
                )?;
            }

            let summary = run.summary();
            writeln!(out, "\nSummary:")?;
            writeln!(out, "  Current Balance: ${:.2}", summary.current_balance)?;
            writeln!(out, "  Min Balance:     ${:.2}", summary.min_balance)?;
            writeln!(out, "  Max Balance:     ${:.2}", summary.max_balance)?;
            writeln!(out, "  Final Balance:   ${:.2}", summary.final_balance)?;
            writeln!(out, "  Risk:            {:?}", summary.risk)?;
        }
    }
    Ok(())
}

fn write_point_csv(out: &mut dyn Write, p: &ForecastPoint) -> io::Result<()> {
    writeln!(
        out,
        "{},{:.2},{:.4},{:.2},{:.2},{:.2}",
        p.date, p.projected_balance, p.confidence, p.breakdown.income, p.breakdown.expenses, p.breakdown.recurring
    )
}

fn write_anomalies(out: &mut dyn Write, format: OutputFormat, anomalies: &[Anomaly]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, anomalies)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "TransactionId,CategoryId,Type,Severity,HistoricalAvg,CurrentValue,DeviationPct,Description")?;
            for a in anomalies {
                writeln!(
                    out,
                    "{},{},{},{},{:.2},{:.2},{:.1},\"{}\"",
                    a.transaction_id.as_deref().unwrap_or(""),
                    a.category_id.as_deref().unwrap_or(""),
                    a.kind.name(),
                    a.severity.as_str(),
                    a.historical_avg().unwrap_or(0.0),
                    a.current_value().unwrap_or(0.0),
                    a.deviation_percentage().unwrap_or(0.0),
                    a.description.replace('"', "\"\""),
                )?;
            }
        }
        OutputFormat::Table => {
            if anomalies.is_empty() {
                writeln!(out, "No anomalies detected")?;
            }
            for a in anomalies {
                writeln!(out, "[{:>6}] {}", a.severity.as_str(), a.description)?;
                writeln!(out, "         {}", a.suggested_action)?;
            }
        }
    }
    Ok(())
}
