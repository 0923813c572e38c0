//! Database operations for recurring templates.
//!
//! Table and column names are taken from [TemplateKind], never from callers.

use rusqlite::{Connection, Row, params};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::{AccountId, get_account},
    currency::resolve_exchange_snapshot,
    recurrence::RecurrenceRule,
    template::{
        RecurringTemplate, TemplateBuilder, TemplateId, TemplateKind, TemplatePatch,
        validate_template,
    },
    transaction::count_generated_transactions,
};

const TEMPLATE_COLUMNS: &str = "id, account_id, description, amount, currency, category_id, \
    family_member_id, exchange_rate, amount_in_primary_currency, recurrence_frequency, \
    recurrence_interval, recurrence_day_of_month, recurrence_day_of_week, start_date, end_date, \
    total_occurrences, current_occurrence, is_active, created_at, updated_at";

/// Validate `builder`, resolve its exchange snapshot and store it as an
/// active template that has not generated anything yet.
///
/// The exchange rate is looked up for the start date of the template when
/// neither a rate nor a converted amount is given.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyDescription], [Error::InvalidAmount], [Error::InvalidRecurrence],
///   [Error::EndDateBeforeStartDate] or [Error::InvalidOccurrenceLimit] if the
///   builder is not valid,
/// - [Error::InvalidAccount] if the account does not exist,
/// - [Error::MissingExchangeRate] or [Error::InvalidExchangeRate] if the
///   exchange snapshot cannot be resolved,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_template(
    kind: TemplateKind,
    builder: TemplateBuilder,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    builder.validate()?;

    let account = get_account(builder.account_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidAccount(builder.account_id),
        error => error,
    })?;

    let snapshot = resolve_exchange_snapshot(
        builder.amount,
        builder.currency,
        account.currency,
        builder.exchange_rate,
        builder.amount_in_primary_currency,
        builder.rule.start_date,
        connection,
    )?;

    let now = OffsetDateTime::now_utc();
    let template = connection
        .prepare(&format!(
            "INSERT INTO {} (account_id, description, amount, currency, category_id,
                family_member_id, exchange_rate, amount_in_primary_currency,
                recurrence_frequency, recurrence_interval, recurrence_day_of_month,
                recurrence_day_of_week, start_date, end_date, total_occurrences,
                current_occurrence, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0, 1, ?16, ?16)
             RETURNING {TEMPLATE_COLUMNS}",
            kind.template_table()
        ))?
        .query_row(
            params![
                builder.account_id,
                builder.description.trim(),
                builder.amount,
                builder.currency,
                builder.category_id,
                builder.family_member_id,
                snapshot.exchange_rate,
                snapshot.amount_in_primary_currency,
                builder.rule.frequency,
                builder.rule.interval,
                builder.rule.day_of_month,
                builder.rule.day_of_week,
                builder.rule.start_date,
                builder.end_date,
                builder.total_occurrences,
                now,
            ],
            map_template_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidAccount(builder.account_id),
            error => error.into(),
        })?;

    tracing::info!(
        event = "template.created",
        kind = %kind,
        template_id = template.id,
        account_id = template.account_id,
        frequency = %template.rule.frequency,
        "created recurring {kind} template"
    );

    Ok(template)
}

/// Retrieve a template by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a template of this kind,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_template(
    kind: TemplateKind,
    id: TemplateId,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {} WHERE id = :id",
            kind.template_table()
        ))?
        .query_row(&[(":id", &id)], map_template_row)
        .map_err(|error| error.into())
}

/// Retrieve the templates of an account, newest first.
///
/// `active` restricts the result to active (`Some(true)`) or inactive
/// (`Some(false)`) templates.
pub fn list_templates(
    kind: TemplateKind,
    account_id: AccountId,
    active: Option<bool>,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {}
             WHERE account_id = ?1 AND (?2 IS NULL OR is_active = ?2)
             ORDER BY created_at DESC, id DESC",
            kind.template_table()
        ))?
        .query_map(params![account_id, active], map_template_row)?
        .map(|maybe_template| maybe_template.map_err(|error| error.into()))
        .collect()
}

/// Apply `patch` to a template of `account_id` and return the updated
/// template.
///
/// The merged template is validated before it is written. When the amount or
/// currency changes the exchange snapshot is resolved again, keeping the
/// stored rate if the currency is unchanged. Transactions the template has
/// already generated are not touched.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyTemplatePatch] if `patch` does not change anything,
/// - [Error::UpdateMissingTemplate] if the template does not exist or belongs
///   to another account,
/// - a validation error if the merged template is not valid,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_template(
    kind: TemplateKind,
    id: TemplateId,
    account_id: AccountId,
    patch: &TemplatePatch,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    if patch.is_empty() {
        return Err(Error::EmptyTemplatePatch);
    }

    let mut template = match get_template(kind, id, connection) {
        Ok(template) if template.account_id == account_id => template,
        Ok(_) | Err(Error::NotFound) => return Err(Error::UpdateMissingTemplate),
        Err(error) => return Err(error),
    };

    let previous_currency = template.currency;
    patch.apply(&mut template);
    validate_template(&template)?;

    if patch.changes_amount() {
        let account = get_account(account_id, connection)?;
        let kept_rate = if template.currency == previous_currency {
            template.exchange_rate
        } else {
            None
        };

        let snapshot = resolve_exchange_snapshot(
            template.amount,
            template.currency,
            account.currency,
            kept_rate,
            None,
            template.rule.start_date,
            connection,
        )?;
        template.exchange_rate = Some(snapshot.exchange_rate);
        template.amount_in_primary_currency = Some(snapshot.amount_in_primary_currency);
    }

    template.updated_at = OffsetDateTime::now_utc();

    let rows_affected = connection.execute(
        &format!(
            "UPDATE {} SET description = ?1, amount = ?2, currency = ?3, category_id = ?4,
                family_member_id = ?5, exchange_rate = ?6, amount_in_primary_currency = ?7,
                recurrence_interval = ?8, recurrence_day_of_month = ?9,
                recurrence_day_of_week = ?10, end_date = ?11, total_occurrences = ?12,
                is_active = ?13, updated_at = ?14
             WHERE id = ?15 AND account_id = ?16",
            kind.template_table()
        ),
        params![
            template.description,
            template.amount,
            template.currency,
            template.category_id,
            template.family_member_id,
            template.exchange_rate,
            template.amount_in_primary_currency,
            template.rule.interval,
            template.rule.day_of_month,
            template.rule.day_of_week,
            template.end_date,
            template.total_occurrences,
            template.is_active,
            template.updated_at,
            id,
            account_id,
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTemplate);
    }

    tracing::info!(
        event = "template.updated",
        kind = %kind,
        template_id = id,
        account_id,
        is_active = template.is_active,
        "updated recurring {kind} template"
    );

    get_template(kind, id, connection)
}

/// Stop a template from generating transactions and return how many
/// transactions it generated. The generated transactions are kept.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTemplate] if the template does not exist or belongs
///   to another account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn deactivate_template(
    kind: TemplateKind,
    id: TemplateId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<u32, Error> {
    let rows_affected = connection.execute(
        &format!(
            "UPDATE {} SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND account_id = ?3",
            kind.template_table()
        ),
        params![OffsetDateTime::now_utc(), id, account_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTemplate);
    }

    let generated = count_generated_transactions(kind, id, connection)?;

    tracing::info!(
        event = "template.deactivated",
        kind = %kind,
        template_id = id,
        account_id,
        generated,
        "deactivated recurring {kind} template"
    );

    Ok(generated)
}

/// Retrieve the active templates whose window covers `date` and whose
/// occurrence limit has not been reached.
///
/// The recurrence rule is not evaluated here.
pub fn get_templates_in_window(
    kind: TemplateKind,
    date: Date,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {}
             WHERE is_active = 1
               AND start_date <= ?1
               AND (end_date IS NULL OR end_date >= ?1)
               AND (total_occurrences IS NULL OR current_occurrence < total_occurrences)
             ORDER BY id ASC",
            kind.template_table()
        ))?
        .query_map([date], map_template_row)?
        .map(|maybe_template| maybe_template.map_err(|error| error.into()))
        .collect()
}

/// The occurrence counter and active flag after [record_occurrence].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceRecord {
    /// The new occurrence count.
    pub current_occurrence: u32,
    /// Whether the template is still active.
    pub is_active: bool,
}

/// Count one generated occurrence and, if `deactivate` is set, deactivate
/// the template in the same statement.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a template of this kind,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_occurrence(
    kind: TemplateKind,
    id: TemplateId,
    deactivate: bool,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<OccurrenceRecord, Error> {
    connection
        .prepare(&format!(
            "UPDATE {} SET current_occurrence = current_occurrence + 1,
                is_active = CASE WHEN ?2 THEN 0 ELSE is_active END,
                updated_at = ?3
             WHERE id = ?1
             RETURNING current_occurrence, is_active",
            kind.template_table()
        ))?
        .query_row(params![id, deactivate, now], |row| {
            Ok(OccurrenceRecord {
                current_occurrence: row.get(0)?,
                is_active: row.get(1)?,
            })
        })
        .map_err(|error| error.into())
}

/// Create the template table for `kind` in the database.
///
/// The frequency column is not constrained so that rows with unknown
/// frequencies can still be read.
pub fn create_template_table(
    kind: TemplateKind,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    let table = kind.template_table();

    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            description TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            currency TEXT NOT NULL CHECK (currency IN ('ARS', 'USD', 'EUR')),
            category_id INTEGER,
            family_member_id INTEGER,
            exchange_rate REAL,
            amount_in_primary_currency REAL,
            recurrence_frequency TEXT NOT NULL,
            recurrence_interval INTEGER NOT NULL DEFAULT 1 CHECK (recurrence_interval > 0),
            recurrence_day_of_month INTEGER
                CHECK (recurrence_day_of_month BETWEEN 1 AND 31),
            recurrence_day_of_week INTEGER
                CHECK (recurrence_day_of_week BETWEEN 0 AND 6),
            start_date TEXT NOT NULL,
            end_date TEXT,
            total_occurrences INTEGER CHECK (total_occurrences > 0),
            current_occurrence INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_window
            ON {table}(is_active, start_date, end_date);

        CREATE INDEX IF NOT EXISTS idx_{table}_account ON {table}(account_id);"
    ))?;

    Ok(())
}

/// Map a database row selected with the template columns to a template.
pub fn map_template_row(row: &Row) -> Result<RecurringTemplate, rusqlite::Error> {
    let rule = RecurrenceRule::new_unchecked(
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    );

    Ok(RecurringTemplate {
        id: row.get(0)?,
        account_id: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        category_id: row.get(5)?,
        family_member_id: row.get(6)?,
        exchange_rate: row.get(7)?,
        amount_in_primary_currency: row.get(8)?,
        rule,
        end_date: row.get(14)?,
        total_occurrences: row.get(15)?,
        current_occurrence: row.get(16)?,
        is_active: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}
