//! Scheduler configuration and the command-line value parsers that build it.

use time::{Date, Time, macros::format_description};

/// When and in which timezone the daily run happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Canonical timezone name, e.g. "America/Argentina/Buenos_Aires". `None`
    /// means UTC.
    pub timezone: Option<String>,
    /// The local time of day of the daily run.
    pub run_at: Time,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            run_at: Time::MIDNIGHT,
        }
    }
}

/// Parse a time of day written as `HH:MM`, e.g. "06:30".
pub fn parse_run_time(text: &str) -> Result<Time, String> {
    Time::parse(text.trim(), format_description!("[hour]:[minute]"))
        .map_err(|error| format!("\"{text}\" is not a time of day in the format HH:MM: {error}"))
}

/// Parse a date written as `YYYY-MM-DD`, e.g. "2024-03-15".
pub fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("\"{text}\" is not a date in the format YYYY-MM-DD: {error}"))
}
