use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use tally_rs::{
    Currency, Frequency, RecurrenceRule, RecurringTemplate, TemplateKind, create_account,
    create_exchange_rate, create_template, initialize_db,
};

/// A utility for creating a test database for the recurring transaction scheduler.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test account...");
    let account = create_account("Household", Currency::Ars, &conn)?;

    let today = OffsetDateTime::now_utc().date();
    let start_date = today - Duration::days(60);
    create_exchange_rate(Currency::Usd, Currency::Ars, 1050.0, start_date, &conn)?;

    println!("Creating recurring templates...");
    let templates = [
        (
            TemplateKind::Expense,
            RecurringTemplate::build(
                account.id,
                "Rent",
                450_000.0,
                Currency::Ars,
                RecurrenceRule::new(Frequency::Monthly, 1, Some(1), None, start_date)?,
            ),
        ),
        (
            TemplateKind::Expense,
            RecurringTemplate::build(
                account.id,
                "Streaming",
                9.99,
                Currency::Usd,
                RecurrenceRule::new(Frequency::Monthly, 1, Some(31), None, start_date)?,
            ),
        ),
        (
            TemplateKind::Expense,
            RecurringTemplate::build(
                account.id,
                "Cleaning",
                30_000.0,
                Currency::Ars,
                RecurrenceRule::new(Frequency::Weekly, 2, None, Some(5), start_date)?,
            )
            .total_occurrences(Some(6)),
        ),
        (
            TemplateKind::Expense,
            RecurringTemplate::build(
                account.id,
                "Coffee",
                2_500.0,
                Currency::Ars,
                RecurrenceRule::new(Frequency::Daily, 1, None, None, start_date)?,
            )
            .end_date(Some(today + Duration::days(30))),
        ),
        (
            TemplateKind::Income,
            RecurringTemplate::build(
                account.id,
                "Salary",
                1_200_000.0,
                Currency::Ars,
                RecurrenceRule::new(Frequency::Monthly, 1, Some(5), None, start_date)?,
            ),
        ),
        (
            TemplateKind::Income,
            RecurringTemplate::build(
                account.id,
                "Freelance retainer",
                500.0,
                Currency::Usd,
                RecurrenceRule::new(Frequency::Monthly, 1, Some(15), None, start_date)?,
            )
            .exchange_rate(Some(1100.0)),
        ),
    ];

    for (kind, builder) in templates {
        let template = create_template(kind, builder, &conn)?;
        println!(
            "  {kind} #{}: {} ({} every {} {})",
            template.id,
            template.description,
            template.amount,
            template.rule.interval,
            template.rule.frequency
        );
    }

    println!("Success!");

    Ok(())
}
