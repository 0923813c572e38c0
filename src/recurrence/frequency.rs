//! The period unit of a recurrence rule.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// How often a recurring template fires, in combination with its interval.
///
/// Codes that this version does not understand are kept as
/// [Frequency::Unrecognized] so that a row written by another writer can still
/// be read. Such templates never generate transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every `interval` days, counted from the start date.
    Daily,
    /// On a fixed day of the week, every `interval` weeks.
    Weekly,
    /// On a fixed day of the month, every `interval` months.
    Monthly,
    /// On a fixed day of the start date's month, every `interval` years.
    Yearly,
    /// A code that is not one of the above.
    #[serde(skip)]
    Unrecognized(String),
}

impl Frequency {
    /// Parse a frequency code such as "monthly".
    pub fn from_code(code: &str) -> Self {
        match code {
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            "yearly" => Frequency::Yearly,
            other => Frequency::Unrecognized(other.to_owned()),
        }
    }

    /// The code stored in the database.
    pub fn code(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
            Frequency::Unrecognized(code) => code,
        }
    }

    /// Whether the frequency anchors on a day of the month.
    pub fn uses_day_of_month(&self) -> bool {
        matches!(self, Frequency::Monthly | Frequency::Yearly)
    }

    /// Whether the frequency anchors on a day of the week.
    pub fn uses_day_of_week(&self) -> bool {
        matches!(self, Frequency::Weekly)
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Frequency::from_code)
    }
}
