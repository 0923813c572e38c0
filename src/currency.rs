//! Currencies, stored exchange rates and the exchange snapshot carried by
//! templates and the transactions generated from them.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, OptionalExtension,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::Error;

/// A currency code that is not supported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0} is not a supported currency code")]
pub struct CurrencyError(pub String);

/// The currencies an account, template or transaction may be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Argentine peso.
    Ars,
    /// United States dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// The ISO 4217 code, e.g. "USD".
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARS" => Ok(Currency::Ars),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(CurrencyError(other.to_owned())),
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ToSql for Currency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The exchange rate and converted amount recorded alongside an amount.
///
/// Both values are frozen when a template is created; generated transactions
/// copy them verbatim instead of converting again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    /// How many units of the primary currency one unit of the amount's
    /// currency is worth.
    pub exchange_rate: f64,
    /// The amount converted into the account's primary currency.
    pub amount_in_primary_currency: f64,
}

impl ExchangeSnapshot {
    /// The snapshot for an amount already in the primary currency.
    pub fn identity(amount: f64) -> Self {
        Self {
            exchange_rate: 1.0,
            amount_in_primary_currency: amount,
        }
    }
}

/// Resolve the exchange snapshot for `amount` in `currency`.
///
/// In order of precedence:
/// 1. `currency` is the primary currency: the rate is 1.
/// 2. `amount_in_primary_currency` is given: the rate is derived from it.
/// 3. `exchange_rate` is given: the converted amount is derived from it.
/// 4. Otherwise the latest stored rate for `rate_date` is used.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingExchangeRate] if no rate was given and none is stored,
/// - [Error::InvalidExchangeRate] if the resolved rate or amount is not positive,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn resolve_exchange_snapshot(
    amount: f64,
    currency: Currency,
    primary_currency: Currency,
    exchange_rate: Option<f64>,
    amount_in_primary_currency: Option<f64>,
    rate_date: Date,
    connection: &Connection,
) -> Result<ExchangeSnapshot, Error> {
    let snapshot = if currency == primary_currency {
        ExchangeSnapshot::identity(amount)
    } else if let Some(converted) = amount_in_primary_currency {
        ExchangeSnapshot {
            exchange_rate: converted / amount,
            amount_in_primary_currency: converted,
        }
    } else if let Some(rate) = exchange_rate {
        ExchangeSnapshot {
            exchange_rate: rate,
            amount_in_primary_currency: amount * rate,
        }
    } else {
        let rate = get_exchange_rate(currency, primary_currency, rate_date, connection)?.ok_or(
            Error::MissingExchangeRate {
                from: currency,
                to: primary_currency,
                date: rate_date,
            },
        )?;

        ExchangeSnapshot {
            exchange_rate: rate,
            amount_in_primary_currency: amount * rate,
        }
    };

    if !(snapshot.exchange_rate.is_finite() && snapshot.exchange_rate > 0.0) {
        return Err(Error::InvalidExchangeRate(snapshot.exchange_rate));
    }

    if !(snapshot.amount_in_primary_currency.is_finite()
        && snapshot.amount_in_primary_currency > 0.0)
    {
        return Err(Error::InvalidExchangeRate(
            snapshot.amount_in_primary_currency,
        ));
    }

    Ok(snapshot)
}

/// Store the rate for converting `from` into `to` on `rate_date`.
///
/// # Errors
/// Returns an [Error::InvalidExchangeRate] if `rate` is not positive, or
/// [Error::SqlError] if there is an SQL error.
pub fn create_exchange_rate(
    from: Currency,
    to: Currency,
    rate: f64,
    rate_date: Date,
    connection: &Connection,
) -> Result<(), Error> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(Error::InvalidExchangeRate(rate));
    }

    connection.execute(
        "INSERT INTO exchange_rate (from_currency, to_currency, rate, rate_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (from, to, rate, rate_date, OffsetDateTime::now_utc()),
    )?;

    Ok(())
}

/// Get the most recently stored rate for converting `from` into `to` on
/// `rate_date`, or `None` if there is no such rate.
pub fn get_exchange_rate(
    from: Currency,
    to: Currency,
    rate_date: Date,
    connection: &Connection,
) -> Result<Option<f64>, Error> {
    connection
        .prepare(
            "SELECT rate FROM exchange_rate
             WHERE from_currency = ?1 AND to_currency = ?2 AND rate_date = ?3
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )?
        .query_row((from, to, rate_date), |row| row.get(0))
        .optional()
        .map_err(|error| error.into())
}

/// Create the exchange rate table in the database.
pub fn create_exchange_rate_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS exchange_rate (
            id INTEGER PRIMARY KEY,
            from_currency TEXT NOT NULL,
            to_currency TEXT NOT NULL,
            rate REAL NOT NULL CHECK (rate > 0),
            rate_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_exchange_rate_lookup
            ON exchange_rate(from_currency, to_currency, rate_date);",
    )?;

    Ok(())
}


#[cfg(test)]
mod resolve_exchange_snapshot_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{Error, db::initialize};

    use super::{Currency, ExchangeSnapshot, create_exchange_rate, resolve_exchange_snapshot};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn same_currency_has_rate_of_one() {
        let conn = get_test_connection();

        let got = resolve_exchange_snapshot(
            250.0,
            Currency::Ars,
            Currency::Ars,
            Some(1234.0),
            None,
            date!(2024 - 01 - 15),
            &conn,
        );

        assert_eq!(got, Ok(ExchangeSnapshot::identity(250.0)));
    }

    #[test]
    fn amount_in_primary_currency_takes_precedence_over_rate() {
        let conn = get_test_connection();

        let got = resolve_exchange_snapshot(
            10.0,
            Currency::Usd,
            Currency::Ars,
            Some(999.0),
            Some(12_000.0),
            date!(2024 - 01 - 15),
            &conn,
        );

        assert_eq!(
            got,
            Ok(ExchangeSnapshot {
                exchange_rate: 1200.0,
                amount_in_primary_currency: 12_000.0,
            })
        );
    }

    #[test]
    fn given_rate_converts_amount() {
        let conn = get_test_connection();

        let got = resolve_exchange_snapshot(
            10.0,
            Currency::Usd,
            Currency::Ars,
            Some(1100.0),
            None,
            date!(2024 - 01 - 15),
            &conn,
        );

        assert_eq!(
            got,
            Ok(ExchangeSnapshot {
                exchange_rate: 1100.0,
                amount_in_primary_currency: 11_000.0,
            })
        );
    }

    #[test]
    fn falls_back_to_latest_stored_rate() {
        let conn = get_test_connection();
        let rate_date = date!(2024 - 01 - 15);
        create_exchange_rate(Currency::Eur, Currency::Usd, 1.05, rate_date, &conn).unwrap();
        create_exchange_rate(Currency::Eur, Currency::Usd, 1.5, rate_date, &conn).unwrap();

        let got = resolve_exchange_snapshot(
            20.0,
            Currency::Eur,
            Currency::Usd,
            None,
            None,
            rate_date,
            &conn,
        );

        assert_eq!(
            got,
            Ok(ExchangeSnapshot {
                exchange_rate: 1.5,
                amount_in_primary_currency: 30.0,
            })
        );
    }

    #[test]
    fn fails_without_any_rate() {
        let conn = get_test_connection();
        let rate_date = date!(2024 - 01 - 15);
        create_exchange_rate(Currency::Eur, Currency::Usd, 1.05, date!(2024 - 01 - 14), &conn)
            .unwrap();

        let got = resolve_exchange_snapshot(
            20.0,
            Currency::Eur,
            Currency::Usd,
            None,
            None,
            rate_date,
            &conn,
        );

        assert_eq!(
            got,
            Err(Error::MissingExchangeRate {
                from: Currency::Eur,
                to: Currency::Usd,
                date: rate_date,
            })
        );
    }

    #[test]
    fn rejects_non_positive_rate() {
        let conn = get_test_connection();

        let got = resolve_exchange_snapshot(
            20.0,
            Currency::Eur,
            Currency::Usd,
            Some(0.0),
            None,
            date!(2024 - 01 - 15),
            &conn,
        );

        assert_eq!(got, Err(Error::InvalidExchangeRate(0.0)));
    }

    #[test]
    fn create_exchange_rate_rejects_negative_rate() {
        let conn = get_test_connection();

        let got = create_exchange_rate(
            Currency::Eur,
            Currency::Usd,
            -2.0,
            date!(2024 - 01 - 15),
            &conn,
        );

        assert_eq!(got, Err(Error::InvalidExchangeRate(-2.0)));
    }
}
