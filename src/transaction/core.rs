//! Defines the core data models and database queries for expenses and incomes.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::AccountId,
    currency::{Currency, ExchangeSnapshot},
    database_id::TransactionId,
    template::{RecurringTemplate, TemplateId, TemplateKind},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction was entered by hand or generated from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    /// Entered by hand.
    OneTime,
    /// Generated by the daily run from a recurring template.
    Recurring,
}

impl TransactionType {
    fn code(self) -> &'static str {
        match self {
            TransactionType::OneTime => "one-time",
            TransactionType::Recurring => "recurring",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "one-time" => Ok(TransactionType::OneTime),
            "recurring" => Ok(TransactionType::Recurring),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// Whether it is an expense or an income depends on the table it is stored
/// in, see [TemplateKind].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// An opaque family member ID.
    pub family_member_id: Option<i64>,
    /// An opaque category ID.
    pub category_id: Option<i64>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned, in `currency`.
    pub amount: f64,
    /// The currency of `amount`.
    pub currency: Currency,
    /// The rate used to convert `amount` into the account's currency.
    pub exchange_rate: f64,
    /// `amount` in the account's currency.
    pub amount_in_primary_currency: f64,
    /// Whether the transaction was generated from a template.
    pub transaction_type: TransactionType,
    /// When the transaction happened.
    pub date: Date,
    /// The template that generated the transaction.
    pub template_id: Option<TemplateId>,
    /// When the row was created.
    pub created_at: OffsetDateTime,
    /// When the row was last changed.
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new one-time transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        account_id: AccountId,
        amount: f64,
        currency: Currency,
        date: Date,
        description: &str,
    ) -> TransactionBuilder {
        TransactionBuilder {
            account_id,
            amount,
            currency,
            date,
            description: description.to_owned(),
            category_id: None,
            family_member_id: None,
            exchange_snapshot: ExchangeSnapshot::identity(amount),
            transaction_type: TransactionType::OneTime,
            template_id: None,
        }
    }

    /// The transaction `template` generates on `date`.
    ///
    /// Copies the financial fields and exchange snapshot of the template and
    /// links the transaction back to it.
    pub fn from_template(template: &RecurringTemplate, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            account_id: template.account_id,
            amount: template.amount,
            currency: template.currency,
            date,
            description: template.description.clone(),
            category_id: template.category_id,
            family_member_id: template.family_member_id,
            exchange_snapshot: template.exchange_snapshot(),
            transaction_type: TransactionType::Recurring,
            template_id: Some(template.id),
        }
    }
}

/// A builder for creating [Transaction] instances.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// The amount of money spent or earned.
    pub amount: f64,
    /// The currency of `amount`.
    pub currency: Currency,
    /// When the transaction happened.
    pub date: Date,
    /// A human-readable description of the transaction.
    pub description: String,
    /// An opaque category ID.
    pub category_id: Option<i64>,
    /// An opaque family member ID.
    pub family_member_id: Option<i64>,
    /// The exchange rate and converted amount.
    ///
    /// Defaults to a rate of 1 and the unconverted amount.
    pub exchange_snapshot: ExchangeSnapshot,
    /// Set to [TransactionType::Recurring] by [Transaction::from_template].
    pub transaction_type: TransactionType,
    /// The generating template, part of the idempotence key together with
    /// `date`.
    pub template_id: Option<TemplateId>,
}

impl TransactionBuilder {
    /// Set the exchange rate and converted amount for the transaction.
    pub fn exchange_snapshot(mut self, exchange_snapshot: ExchangeSnapshot) -> Self {
        self.exchange_snapshot = exchange_snapshot;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

fn transaction_columns(kind: TemplateKind) -> String {
    format!(
        "id, account_id, family_member_id, category_id, description, amount, currency, \
         exchange_rate, amount_in_primary_currency, transaction_type, date, {}, created_at, \
         updated_at",
        kind.template_column()
    )
}

/// Create a new expense or income in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateOccurrence] if the template already generated a
///   transaction on the same date,
/// - [Error::InvalidAccount] if the account or template does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    kind: TemplateKind,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO {} (account_id, family_member_id, category_id, description, amount,
                currency, exchange_rate, amount_in_primary_currency, transaction_type, date,
                {}, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
             RETURNING {}",
            kind.transaction_table(),
            kind.template_column(),
            transaction_columns(kind)
        ))?
        .query_row(
            params![
                builder.account_id,
                builder.family_member_id,
                builder.category_id,
                builder.description,
                builder.amount,
                builder.currency,
                builder.exchange_snapshot.exchange_rate,
                builder.exchange_snapshot.amount_in_primary_currency,
                builder.transaction_type,
                builder.date,
                builder.template_id,
                now,
            ],
            map_transaction_row,
        )
        .map_err(|error| match (error, builder.template_id) {
            (
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                    },
                    _,
                ),
                Some(template_id),
            ) => Error::DuplicateOccurrence {
                template_id,
                date: builder.date,
            },
            (
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                    },
                    _,
                ),
                _,
            ) => Error::InvalidAccount(builder.account_id),
            (error, _) => error.into(),
        })
}

/// Retrieve an expense or income from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    kind: TemplateKind,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {} FROM {} WHERE id = :id",
            transaction_columns(kind),
            kind.transaction_table()
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| error.into())
}

/// Whether `template_id` already generated a transaction on `date`.
pub fn generated_transaction_exists(
    kind: TemplateKind,
    template_id: TemplateId,
    date: Date,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            &format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = ?1 AND date = ?2)",
                kind.transaction_table(),
                kind.template_column()
            ),
            params![template_id, date],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Retrieve the transactions generated by a template, oldest first.
pub fn get_generated_transactions(
    kind: TemplateKind,
    template_id: TemplateId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {} FROM {} WHERE {} = :template_id ORDER BY date ASC, id ASC",
            transaction_columns(kind),
            kind.transaction_table(),
            kind.template_column()
        ))?
        .query_map(&[(":template_id", &template_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Count the transactions generated by a template.
pub fn count_generated_transactions(
    kind: TemplateKind,
    template_id: TemplateId,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            &format!(
                "SELECT COUNT(id) FROM {} WHERE {} = ?1",
                kind.transaction_table(),
                kind.template_column()
            ),
            [template_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get the total number of expenses or incomes in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(kind: TemplateKind, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            &format!("SELECT COUNT(id) FROM {}", kind.transaction_table()),
            [],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the expense or income table in the database.
///
/// A unique index on the template column and date makes a second generated
/// row for the same occurrence fail.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(
    kind: TemplateKind,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    let table = kind.transaction_table();
    let template_column = kind.template_column();
    let template_table = kind.template_table();

    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            family_member_id INTEGER,
            category_id INTEGER,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            exchange_rate REAL NOT NULL DEFAULT 1.0,
            amount_in_primary_currency REAL NOT NULL,
            transaction_type TEXT NOT NULL DEFAULT 'one-time'
                CHECK (transaction_type IN ('one-time', 'recurring')),
            date TEXT NOT NULL,
            {template_column} INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE,
            FOREIGN KEY({template_column}) REFERENCES {template_table}(id) ON DELETE SET NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_occurrence
            ON {table}({template_column}, date);

        CREATE INDEX IF NOT EXISTS idx_{table}_account_date ON {table}(account_id, date);"
    ))?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        family_member_id: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        currency: row.get(6)?,
        exchange_rate: row.get(7)?,
        amount_in_primary_currency: row.get(8)?,
        transaction_type: row.get(9)?,
        date: row.get(10)?,
        template_id: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        account::{Account, create_account},
        currency::{Currency, ExchangeSnapshot},
        db::initialize,
        recurrence::{Frequency, RecurrenceRule},
        template::{RecurringTemplate, TemplateKind, create_template},
        transaction::{
            Transaction, TransactionType, count_generated_transactions, count_transactions,
            create_transaction, generated_transaction_exists, get_generated_transactions,
            get_transaction,
        },
    };

    fn get_test_connection() -> (Connection, Account) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let account = create_account("Household", Currency::Ars, &conn).unwrap();
        (conn, account)
    }

    fn create_test_template(
        kind: TemplateKind,
        account: &Account,
        conn: &Connection,
    ) -> RecurringTemplate {
        create_template(
            kind,
            RecurringTemplate::build(
                account.id,
                "Streaming",
                15.0,
                Currency::Usd,
                RecurrenceRule::new_unchecked(
                    Frequency::Monthly,
                    1,
                    Some(5),
                    None,
                    date!(2024 - 01 - 05),
                ),
            )
            .exchange_rate(Some(800.0))
            .category_id(Some(4)),
            conn,
        )
        .expect("Could not create template")
    }

    #[test]
    fn create_one_time_succeeds() {
        let (conn, account) = get_test_connection();

        let result = create_transaction(
            TemplateKind::Expense,
            Transaction::build(account.id, 12.3, Currency::Ars, date!(2025 - 10 - 05), "Coffee"),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.amount, 12.3);
                assert_eq!(transaction.amount_in_primary_currency, 12.3);
                assert_eq!(transaction.exchange_rate, 1.0);
                assert_eq!(transaction.transaction_type, TransactionType::OneTime);
                assert_eq!(transaction.template_id, None);
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn from_template_copies_snapshot() {
        let (conn, account) = get_test_connection();
        let template = create_test_template(TemplateKind::Expense, &account, &conn);
        let date = date!(2024 - 02 - 05);

        let transaction = create_transaction(
            TemplateKind::Expense,
            Transaction::from_template(&template, date),
            &conn,
        )
        .expect("Could not create transaction");

        assert_eq!(transaction.account_id, account.id);
        assert_eq!(transaction.description, "Streaming");
        assert_eq!(transaction.amount, 15.0);
        assert_eq!(transaction.currency, Currency::Usd);
        assert_eq!(transaction.category_id, Some(4));
        assert_eq!(transaction.exchange_rate, 800.0);
        assert_eq!(transaction.amount_in_primary_currency, 12_000.0);
        assert_eq!(transaction.transaction_type, TransactionType::Recurring);
        assert_eq!(transaction.date, date);
        assert_eq!(transaction.template_id, Some(template.id));
        assert_eq!(
            get_transaction(TemplateKind::Expense, transaction.id, &conn),
            Ok(transaction)
        );
    }

    #[test]
    fn create_fails_on_duplicate_occurrence() {
        let (conn, account) = get_test_connection();
        let template = create_test_template(TemplateKind::Income, &account, &conn);
        let date = date!(2024 - 03 - 05);
        create_transaction(
            TemplateKind::Income,
            Transaction::from_template(&template, date),
            &conn,
        )
        .expect("Could not create transaction");

        let duplicate = create_transaction(
            TemplateKind::Income,
            Transaction::from_template(&template, date),
            &conn,
        );

        assert_eq!(
            duplicate,
            Err(Error::DuplicateOccurrence {
                template_id: template.id,
                date,
            })
        );
        assert_eq!(count_transactions(TemplateKind::Income, &conn), Ok(1));
    }

    #[test]
    fn one_time_transactions_on_same_date_do_not_conflict() {
        let (conn, account) = get_test_connection();
        let date = date!(2024 - 03 - 05);

        for _ in 0..3 {
            create_transaction(
                TemplateKind::Expense,
                Transaction::build(account.id, 1.0, Currency::Ars, date, "Bus"),
                &conn,
            )
            .expect("Could not create transaction");
        }

        assert_eq!(count_transactions(TemplateKind::Expense, &conn), Ok(3));
    }

    #[test]
    fn create_fails_on_invalid_account() {
        let (conn, account) = get_test_connection();
        let account_id = account.id + 1;

        let result = create_transaction(
            TemplateKind::Expense,
            Transaction::build(account_id, 1.0, Currency::Ars, date!(2024 - 03 - 05), "Bus"),
            &conn,
        );

        assert_eq!(result, Err(Error::InvalidAccount(account_id)));
    }

    #[test]
    fn exists_and_count_are_per_template_and_kind() {
        let (conn, account) = get_test_connection();
        let template = create_test_template(TemplateKind::Expense, &account, &conn);
        for date in [date!(2024 - 01 - 05), date!(2024 - 02 - 05)] {
            create_transaction(
                TemplateKind::Expense,
                Transaction::from_template(&template, date),
                &conn,
            )
            .unwrap();
        }

        let exists = |kind, date| generated_transaction_exists(kind, template.id, date, &conn);

        assert_eq!(exists(TemplateKind::Expense, date!(2024 - 01 - 05)), Ok(true));
        assert_eq!(exists(TemplateKind::Expense, date!(2024 - 03 - 05)), Ok(false));
        assert_eq!(exists(TemplateKind::Income, date!(2024 - 01 - 05)), Ok(false));
        assert_eq!(
            count_generated_transactions(TemplateKind::Expense, template.id, &conn),
            Ok(2)
        );
        assert_eq!(
            count_generated_transactions(TemplateKind::Income, template.id, &conn),
            Ok(0)
        );
    }

    #[test]
    fn generated_transactions_are_ordered_by_date() {
        let (conn, account) = get_test_connection();
        let template = create_test_template(TemplateKind::Income, &account, &conn);
        for date in [date!(2024 - 03 - 05), date!(2024 - 01 - 05)] {
            create_transaction(
                TemplateKind::Income,
                Transaction::from_template(&template, date),
                &conn,
            )
            .unwrap();
        }
        create_transaction(
            TemplateKind::Income,
            Transaction::build(account.id, 1.0, Currency::Ars, date!(2024 - 02 - 05), "Gift")
                .exchange_snapshot(ExchangeSnapshot::identity(1.0)),
            &conn,
        )
        .unwrap();

        let got: Vec<_> = get_generated_transactions(TemplateKind::Income, template.id, &conn)
            .unwrap()
            .into_iter()
            .map(|transaction| transaction.date)
            .collect();

        assert_eq!(got, vec![date!(2024 - 01 - 05), date!(2024 - 03 - 05)]);
    }
}
