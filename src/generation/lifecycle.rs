use std::fmt::Display;

use rusqlite::Connection;
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    template::{RecurringTemplate, TemplateKind, record_occurrence},
};

/// Why a template was deactivated after generating a transaction. Both
/// conditions may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeactivationReason {
    /// The template generated its last allowed occurrence.
    pub occurrences_exhausted: bool,
    /// The generation date reached the end date of the template.
    pub end_date_reached: bool,
}

impl Display for DeactivationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.occurrences_exhausted, self.end_date_reached) {
            (true, true) => write!(f, "occurrence limit and end date reached"),
            (true, false) => write!(f, "occurrence limit reached"),
            (false, true) => write!(f, "end date reached"),
            (false, false) => write!(f, "no reason"),
        }
    }
}

/// Whether generating on `date` uses up `template`, judged from the template
/// as it was selected, i.e. before its counter was incremented.
pub fn deactivation_reason(template: &RecurringTemplate, date: Date) -> Option<DeactivationReason> {
    let occurrences_exhausted = template
        .total_occurrences
        .is_some_and(|total| template.current_occurrence + 1 >= total);
    let end_date_reached = template.end_date.is_some_and(|end_date| date >= end_date);

    (occurrences_exhausted || end_date_reached).then_some(DeactivationReason {
        occurrences_exhausted,
        end_date_reached,
    })
}

/// The state of a template after [advance].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleUpdate {
    /// The occurrence count after the increment.
    pub current_occurrence: u32,
    /// Set if the template was deactivated.
    pub deactivated: Option<DeactivationReason>,
}

/// Count the occurrence `template` generated on `date` and deactivate the
/// template if it is used up.
///
/// Only call this after a successful generation. The increment and the
/// deactivation are applied by a single statement.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the template no longer exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn advance(
    kind: TemplateKind,
    template: &RecurringTemplate,
    date: Date,
    connection: &Connection,
) -> Result<LifecycleUpdate, Error> {
    let reason = deactivation_reason(template, date);

    let record = record_occurrence(
        kind,
        template.id,
        reason.is_some(),
        OffsetDateTime::now_utc(),
        connection,
    )?;

    if let Some(reason) = reason {
        tracing::info!(
            event = "lifecycle.deactivated",
            kind = %kind,
            template_id = template.id,
            current_occurrence = record.current_occurrence,
            total_occurrences = ?template.total_occurrences,
            end_date = ?template.end_date,
            %reason,
            "deactivated {kind} template: {reason}"
        );
    }

    Ok(LifecycleUpdate {
        current_occurrence: record.current_occurrence,
        deactivated: reason,
    })
}
