use std::{
    error::Error,
    path::PathBuf,
    process::exit,
    sync::{Arc, Mutex},
};

use clap::Parser;
use rusqlite::Connection;
use serde_json::{Value, json};
use time::{Date, Time};

use tally_rs::{
    DailyReport, RunSummary, Scheduler, SchedulerConfig, get_local_offset, initialize_db,
    parse_date, parse_run_time, setup_logging, shutdown_signal,
};

/// Generates expenses and incomes from recurring templates once a day.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: PathBuf,

    /// Canonical timezone that decides what "today" is, e.g.
    /// "America/Argentina/Buenos_Aires". Defaults to UTC.
    #[arg(long)]
    timezone: Option<String>,

    /// Local time of the daily run, as HH:MM.
    #[arg(long, default_value = "00:00", value_parser = parse_run_time)]
    run_at: Time,

    /// Also write debug logs to this file.
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Run once for today and exit instead of running as a daemon.
    #[arg(long)]
    once: bool,

    /// Run once for this date (YYYY-MM-DD) and exit.
    #[arg(long, value_parser = parse_date)]
    date: Option<Date>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging(args.log_path.as_deref())?;

    if let Some(timezone) = args
        .timezone
        .as_deref()
        .filter(|timezone| get_local_offset(timezone).is_none())
    {
        eprintln!("\"{timezone}\" is not a canonical timezone name, e.g. \"Europe/Madrid\".");
        exit(1);
    }

    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;

    let scheduler = Scheduler::new(
        Arc::new(Mutex::new(conn)),
        SchedulerConfig {
            timezone: args.timezone,
            run_at: args.run_at,
        },
    );

    if args.once || args.date.is_some() {
        let report = match args.date {
            Some(date) => scheduler.run_pass_for(date).await?,
            None => scheduler.run_pass().await?,
        };

        println!("{}", serde_json::to_string_pretty(&report_to_json(&report))?);

        if report.has_errors() {
            exit(2);
        }

        return Ok(());
    }

    tracing::info!(
        "Scheduler started for {}, running daily at {}",
        args.db_path.display(),
        scheduler.config().run_at
    );
    scheduler.run(shutdown_signal()).await;

    Ok(())
}

fn report_to_json(report: &DailyReport) -> Value {
    json!({
        "date": report.date.to_string(),
        "expenses": summary_to_json(&report.expenses),
        "incomes": summary_to_json(&report.incomes),
    })
}

fn summary_to_json(summary: &Result<RunSummary, tally_rs::Error>) -> Value {
    match summary {
        Ok(summary) => json!(summary),
        Err(error) => json!({ "error": error.to_string() }),
    }
}
