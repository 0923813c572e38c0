//! Accounts own templates and transactions and fix the primary currency that
//! amounts are converted into.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, currency::Currency};

/// Database identifier for an account.
pub type AccountId = i64;

/// A personal or family account that expenses and incomes are booked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// The primary currency of the account.
    pub currency: Currency,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

/// Create an account and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateAccountName] if an account named `name` already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    name: &str,
    currency: Currency,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "INSERT INTO account (name, currency, created_at) VALUES (?1, ?2, ?3)
             RETURNING id, name, currency, created_at",
        )?
        .query_row(
            (name, currency, OffsetDateTime::now_utc()),
            map_row_to_account,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateAccountName(name.to_owned()),
            error => error.into(),
        })
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare("SELECT id, name, currency, created_at FROM account WHERE id = :id")?
        .query_row(&[(":id", &id)], map_row_to_account)
        .map_err(|error| error.into())
}

/// Create the account table in the database.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            currency TEXT NOT NULL CHECK (currency IN ('ARS', 'USD', 'EUR')),
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let currency = row.get(2)?;
    let created_at = row.get(3)?;

    Ok(Account {
        id,
        name,
        currency,
        created_at,
    })
}


#[cfg(test)]
mod account_query_tests {
    use rusqlite::Connection;

    use crate::{Error, currency::Currency};

    use super::{create_account, create_account_table, get_account};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_account_table(&conn).unwrap();
        conn
    }

    #[test]
    fn create_account_succeeds() {
        let conn = get_test_connection();

        let account = create_account("Household", Currency::Ars, &conn)
            .expect("Could not create account");

        assert!(account.id > 0);
        assert_eq!(account.name, "Household");
        assert_eq!(account.currency, Currency::Ars);
    }

    #[test]
    fn create_account_fails_on_duplicate_name() {
        let conn = get_test_connection();
        create_account("Household", Currency::Ars, &conn).expect("Could not create account");

        let duplicate = create_account("Household", Currency::Usd, &conn);

        assert_eq!(
            duplicate,
            Err(Error::DuplicateAccountName("Household".to_owned()))
        );
    }

    #[test]
    fn get_account_returns_created_account() {
        let conn = get_test_connection();
        let inserted = create_account("Savings", Currency::Usd, &conn).unwrap();

        let selected = get_account(inserted.id, &conn);

        assert_eq!(selected, Ok(inserted));
    }

    #[test]
    fn get_account_with_invalid_id_returns_not_found() {
        let conn = get_test_connection();

        let selected = get_account(42, &conn);

        assert_eq!(selected, Err(Error::NotFound));
    }
}
