//! Runs the selector, generator and lifecycle updater for every template of a
//! kind and tallies the outcome.

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    generation::{GenerationError, advance, generate, select_candidates},
    template::TemplateKind,
};

/// The outcome of one generation run for one kind of template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Which templates were processed.
    pub kind: TemplateKind,
    /// The number of candidate templates.
    pub total: u32,
    /// Candidates that generated a transaction.
    pub success: u32,
    /// Candidates that had already generated a transaction on the date.
    pub skipped: u32,
    /// Candidates whose transaction could not be checked or inserted.
    pub errors: u32,
    /// Templates deactivated after generating.
    pub deactivated: u32,
}

impl RunSummary {
    fn new(kind: TemplateKind, total: usize) -> Self {
        Self {
            kind,
            total: u32::try_from(total).unwrap_or(u32::MAX),
            success: 0,
            skipped: 0,
            errors: 0,
            deactivated: 0,
        }
    }
}

/// Generate the transactions every template of `kind` owes for `date`.
///
/// A template that fails to generate is counted in [RunSummary::errors] and
/// does not stop the run. A failure to count a generated occurrence is only
/// logged, the generation still counts as a success.
///
/// # Errors
/// Returns an error only if the candidate templates cannot be listed.
pub fn run_daily(
    kind: TemplateKind,
    date: Date,
    connection: &Connection,
) -> Result<RunSummary, Error> {
    tracing::info!(
        event = "generation.start",
        kind = %kind,
        %date,
        "starting recurring {kind} generation for {date}"
    );

    let candidates = select_candidates(kind, date, connection).inspect_err(|error| {
        tracing::error!(
            event = "generation.list_error",
            kind = %kind,
            %date,
            %error,
            "could not list recurring {kind} templates: {error}"
        );
    })?;

    tracing::info!(
        event = "generation.found",
        kind = %kind,
        %date,
        count = candidates.len(),
        "found {} recurring {kind} templates due on {date}",
        candidates.len()
    );

    let mut summary = RunSummary::new(kind, candidates.len());

    for template in &candidates {
        match generate(kind, template, date, connection) {
            Ok(_) => {
                summary.success += 1;

                match advance(kind, template, date, connection) {
                    Ok(update) if update.deactivated.is_some() => summary.deactivated += 1,
                    Ok(_) => {}
                    Err(error) => tracing::error!(
                        event = "lifecycle.increment_error",
                        kind = %kind,
                        template_id = template.id,
                        %date,
                        %error,
                        "could not update the occurrence count of template {}: {error}",
                        template.id
                    ),
                }
            }
            Err(GenerationError::AlreadyGenerated) => {
                summary.skipped += 1;
                tracing::info!(
                    event = "generation.skip",
                    kind = %kind,
                    template_id = template.id,
                    %date,
                    "template {} already generated a {kind} on {date}",
                    template.id
                );
            }
            Err(GenerationError::CheckFailed(error)) => {
                summary.errors += 1;
                tracing::error!(
                    event = "generation.check_error",
                    kind = %kind,
                    template_id = template.id,
                    %date,
                    %error,
                    "could not check template {} for an existing {kind}: {error}",
                    template.id
                );
            }
            Err(GenerationError::InsertFailed(error)) => {
                summary.errors += 1;
                tracing::error!(
                    event = "generation.generate_error",
                    kind = %kind,
                    template_id = template.id,
                    %date,
                    %error,
                    "could not generate a {kind} from template {}: {error}",
                    template.id
                );
            }
        }
    }

    tracing::info!(
        event = "generation.complete",
        kind = %kind,
        %date,
        total = summary.total,
        success = summary.success,
        skipped = summary.skipped,
        errors = summary.errors,
        deactivated = summary.deactivated,
        "recurring {kind} generation for {date} complete"
    );

    Ok(summary)
}

/// The outcome of generating both expenses and incomes for a date.
#[derive(Debug, PartialEq)]
pub struct DailyReport {
    /// The date transactions were generated for.
    pub date: Date,
    /// The expense run.
    pub expenses: Result<RunSummary, Error>,
    /// The income run.
    pub incomes: Result<RunSummary, Error>,
}

impl DailyReport {
    /// Whether either run failed or any template failed to generate.
    pub fn has_errors(&self) -> bool {
        [&self.expenses, &self.incomes]
            .into_iter()
            .any(|result| !result.as_ref().is_ok_and(|summary| summary.errors == 0))
    }
}

/// Generate expenses and then incomes for `date`. A failure of one kind does
/// not prevent the other from running.
pub fn run_all(date: Date, connection: &Connection) -> DailyReport {
    DailyReport {
        date,
        expenses: run_daily(TemplateKind::Expense, date, connection),
        incomes: run_daily(TemplateKind::Income, date, connection),
    }
}
