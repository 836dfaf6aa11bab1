//! Run forecasts and anomaly detection for every user in a multi-user export
//!
//! Each user is independent, so users are processed in parallel. Outputs one
//! summary row per user plus, optionally, every forecast point.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use balance_forecast::{
    ledger::{load_balances, load_user_recurring_from_reader, load_user_transactions_from_reader},
    AnomalyLog, EngineConfig, ForecastPoint, ForecastService, ForecastStore, ForecastSummary, InMemoryLedger,
    LedgerSource,
};
use chrono::NaiveDate;
use clap::Parser;
use log::warn;
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "run_batch", about = "Forecast every user in a multi-user export")]
struct Cli {
    /// Transaction CSV with a user_id column
    #[arg(long)]
    transactions: PathBuf,

    /// Recurring transaction CSV with a user_id column
    #[arg(long)]
    recurring: Option<PathBuf>,

    /// Balance CSV (user_id,balance); users missing from it start at zero
    #[arg(long)]
    balances: Option<PathBuf>,

    /// Forecast start date (defaults to today)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Summary output path
    #[arg(long, default_value = "batch_forecast_summary.csv")]
    output: PathBuf,

    /// Also write every forecast point to this path
    #[arg(long)]
    points: Option<PathBuf>,
}

/// Result for one user
struct UserResult {
    user_id: String,
    baseline: f64,
    summary: ForecastSummary,
    points: Vec<ForecastPoint>,
    anomaly_count: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let start = Instant::now();
    let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    println!("Loading ledger data...");
    let ledger = load_ledger(&cli)?;
    let users = ledger.users();
    println!("Loaded {} users in {:?}", users.len(), start.elapsed());

    println!("Running forecasts...");
    let proj_start = Instant::now();

    let results: Vec<UserResult> = users
        .par_iter()
        .filter_map(|user_id| match run_user(&ledger, &config, user_id, today) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("skipping user {}: {:#}", user_id, e);
                None
            }
        })
        .collect();

    println!(
        "Forecasts complete for {}/{} users in {:?}",
        results.len(),
        users.len(),
        proj_start.elapsed()
    );

    write_summary(&cli.output, &results)?;
    println!("Summary written to {}", cli.output.display());

    if let Some(path) = &cli.points {
        write_points(path, &results)?;
        println!("Forecast points written to {}", path.display());
    }

    let negative = results
        .iter()
        .filter(|r| r.summary.first_negative_date.is_some())
        .count();
    let anomalies: usize = results.iter().map(|r| r.anomaly_count).sum();
    println!("\nBatch Summary:");
    println!("  Users projected:        {}", results.len());
    println!("  Users going negative:   {}", negative);
    println!("  Anomalies detected:     {}", anomalies);
    println!("\nTotal time: {:?}", start.elapsed());

    Ok(())
}

fn load_ledger(cli: &Cli) -> Result<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new();

    let file = File::open(&cli.transactions)
        .with_context(|| format!("failed to open {}", cli.transactions.display()))?;
    for (user_id, transactions) in load_user_transactions_from_reader(file)? {
        ledger.add_transactions(&user_id, transactions);
    }

    if let Some(path) = &cli.recurring {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        for (user_id, recurring) in load_user_recurring_from_reader(file)? {
            ledger.add_recurring(&user_id, recurring);
        }
    }

    if let Some(path) = &cli.balances {
        let balances = load_balances(path).with_context(|| format!("failed to load balances {}", path.display()))?;
        for (user_id, balance) in balances {
            ledger.set_balance(&user_id, balance);
        }
    }

    Ok(ledger)
}

fn run_user(ledger: &InMemoryLedger, config: &EngineConfig, user_id: &str, today: NaiveDate) -> Result<UserResult> {
    let mut service = ForecastService::new(ledger, config.clone());
    let mut store = ForecastStore::new();
    let mut log = AnomalyLog::new();

    let mut forecast = config.forecast.clone();
    if forecast.include_recurring && ledger.active_recurring(user_id)?.is_empty() {
        forecast.include_recurring = false;
    }

    let run = service.recalculate_with(user_id, today, forecast, &mut store)?;
    let anomalies = service.detect_anomalies(user_id, today, &mut log)?;

    Ok(UserResult {
        user_id: user_id.to_string(),
        baseline: run.baseline,
        summary: run.summary(),
        points: run.points,
        anomaly_count: anomalies.len(),
    })
}

fn write_summary(path: &Path, results: &[UserResult]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path).with_context(|| format!("failed to create {}", path.display()))?);

    writeln!(file, "UserId,CurrentBalance,Baseline,MinBalance,MaxBalance,FinalBalance,Risk,FirstNegativeDate,Anomalies")?;
    for r in results {
        let risk = match r.summary.risk {
            balance_forecast::BalanceRisk::Negative { .. } => "negative",
            balance_forecast::BalanceRisk::Declining => "declining",
            balance_forecast::BalanceRisk::Stable => "stable",
        };
        writeln!(
            file,
            "{},{:.2},{:.2},{:.2},{:.2},{:.2},{},{},{}",
            r.user_id,
            r.summary.current_balance,
            r.baseline,
            r.summary.min_balance,
            r.summary.max_balance,
            r.summary.final_balance,
            risk,
            r.summary.first_negative_date.map(|d| d.to_string()).unwrap_or_default(),
            r.anomaly_count,
        )?;
    }

    file.flush()?;
    Ok(())
}

fn write_points(path: &Path, results: &[UserResult]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path).with_context(|| format!("failed to create {}", path.display()))?);

    writeln!(file, "UserId,Date,ProjectedBalance,Confidence,Income,Expenses,Recurring")?;
    for r in results {
        for p in &r.points {
            writeln!(
                file,
                "{},{},{:.2},{:.4},{:.2},{:.2},{:.2}",
                r.user_id,
                p.date,
                p.projected_balance,
                p.confidence,
                p.breakdown.income,
                p.breakdown.expenses,
                p.breakdown.recurring,
            )?;
        }
    }

    file.flush()?;
    Ok(())
}
