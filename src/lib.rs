//! Tally is the back office of a personal and family finance tracker.
//!
//! This library owns the recurring transaction engine: recurring expense and
//! income templates, the rules that decide on which days a template fires, and
//! the daily batch that turns templates into concrete expense and income rows
//! exactly once per occurrence.
//!
//! <br>
//!
//! The engine is driven by [Scheduler], which runs a catch-up pass when the
//! process starts and then one pass per day at a configured local time.

#![warn(missing_docs)]

use time::Date;

mod account;
mod config;
mod currency;
mod database_id;
mod db;
mod generation;
mod logging;
mod recurrence;
mod scheduler;
mod template;
mod timezone;
mod transaction;

pub use account::{Account, AccountId, create_account, get_account};
pub use config::{SchedulerConfig, parse_date, parse_run_time};
pub use currency::{
    Currency, CurrencyError, ExchangeSnapshot, create_exchange_rate, get_exchange_rate,
};
pub use database_id::TransactionId;
pub use db::initialize as initialize_db;
pub use generation::{
    DailyReport, DeactivationReason, GenerationError, LifecycleUpdate, RunSummary, advance,
    deactivation_reason, generate, run_all, run_daily, select_candidates,
};
pub use logging::setup_logging;
pub use recurrence::{Frequency, RecurrenceRule};
pub use scheduler::{Scheduler, duration_until_next_run, shutdown_signal};
pub use template::{
    RecurringTemplate, TemplateBuilder, TemplateId, TemplateKind, TemplatePatch,
    create_template, deactivate_template, get_template, list_templates, update_template,
};
pub use timezone::{get_local_offset, local_today};
pub use transaction::{
    Transaction, TransactionBuilder, TransactionType, count_generated_transactions,
    count_transactions, create_transaction, get_generated_transactions, get_transaction,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A background task panicked or was cancelled before it finished.
    #[error("a background task failed: {0}")]
    BackgroundTaskFailed(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The specified account name already exists in the database.
    #[error("the account \"{0}\" already exists in the database")]
    DuplicateAccountName(String),

    /// The account ID used to create a template or transaction does not refer
    /// to an existing account.
    #[error("the account ID {0} does not refer to a valid account")]
    InvalidAccount(AccountId),

    /// A template description was empty or only whitespace.
    #[error("description cannot be empty")]
    EmptyDescription,

    /// Template amounts must be positive, finite numbers.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// The recurrence configuration of a template is inconsistent, e.g. a
    /// weekly template without a day of the week.
    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(String),

    /// The end date of a template falls before its start date.
    #[error("the end date {end_date} is before the start date {start_date}")]
    EndDateBeforeStartDate {
        /// The first day the template may fire.
        start_date: Date,
        /// The rejected end date.
        end_date: Date,
    },

    /// The occurrence limit of a template must be at least one.
    #[error("total occurrences must be greater than zero")]
    InvalidOccurrenceLimit,

    /// The currency code is not one of the supported currencies.
    #[error("unsupported currency \"{0}\"")]
    UnsupportedCurrency(String),

    /// No exchange rate was given and none was stored for the currency pair on
    /// the given date.
    #[error("no exchange rate from {from} to {to} on {date}, provide an exchange rate or the amount in the primary currency")]
    MissingExchangeRate {
        /// The template currency.
        from: Currency,
        /// The account's primary currency.
        to: Currency,
        /// The date the rate was looked up for.
        date: Date,
    },

    /// A resolved exchange rate or converted amount was not positive.
    #[error("{0} is not a valid exchange rate or converted amount")]
    InvalidExchangeRate(f64),

    /// A template update did not set any field.
    #[error("the template update does not change any fields")]
    EmptyTemplatePatch,

    /// A transaction for this template and date already exists.
    ///
    /// The pair of template ID and date is the idempotence key of generated
    /// transactions, so the database rejects a second row for the same pair.
    #[error("template {template_id} already generated a transaction on {date}")]
    DuplicateOccurrence {
        /// The template that generated the existing transaction.
        template_id: TemplateId,
        /// The date of the existing transaction.
        date: Date,
    },

    /// Tried to update a template that does not exist
    #[error("tried to update a template that is not in the database")]
    UpdateMissingTemplate,

    /// Tried to delete a template that does not exist
    #[error("tried to delete a template that is not in the database")]
    DeleteMissingTemplate,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<CurrencyError> for Error {
    fn from(value: CurrencyError) -> Self {
        Error::UnsupportedCurrency(value.0)
    }
}
