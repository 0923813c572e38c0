use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    template::{RecurringTemplate, TemplateKind, get_templates_in_window},
};

/// The templates of `kind` that should generate a transaction on `date`.
///
/// A template is a candidate when it is active, `date` falls within its start
/// and end dates, its occurrence limit has not been reached and its
/// recurrence rule fires on `date`. The order is not significant.
///
/// # Errors
/// Returns an [Error::SqlError] if the templates cannot be listed.
pub fn select_candidates(
    kind: TemplateKind,
    date: Date,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    let candidates = get_templates_in_window(kind, date, connection)?
        .into_iter()
        .filter(|template| template.is_open_on(date) && template.rule.should_generate(date))
        .collect();

    Ok(candidates)
}
