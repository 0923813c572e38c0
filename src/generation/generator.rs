use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    template::{RecurringTemplate, TemplateKind},
    transaction::{Transaction, create_transaction, generated_transaction_exists},
};

/// Why a template did not generate a transaction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GenerationError {
    /// The template already generated a transaction on this date. Not a
    /// failure, the occurrence is skipped.
    #[error("a transaction was already generated for this date")]
    AlreadyGenerated,

    /// Checking for an existing transaction failed.
    #[error("could not check for an existing transaction: {0}")]
    CheckFailed(Error),

    /// Inserting the transaction failed.
    #[error("could not insert the transaction: {0}")]
    InsertFailed(Error),
}

/// Generate the transaction `template` owes for `date`, at most once.
///
/// Returns [GenerationError::AlreadyGenerated] if a transaction for the
/// template and date exists, including when another run inserts it between
/// the check and the insert.
pub fn generate(
    kind: TemplateKind,
    template: &RecurringTemplate,
    date: Date,
    connection: &Connection,
) -> Result<TransactionId, GenerationError> {
    let exists = generated_transaction_exists(kind, template.id, date, connection)
        .map_err(GenerationError::CheckFailed)?;

    if exists {
        return Err(GenerationError::AlreadyGenerated);
    }

    let transaction =
        create_transaction(kind, Transaction::from_template(template, date), connection)
            .map_err(|error| match error {
                Error::DuplicateOccurrence { .. } => GenerationError::AlreadyGenerated,
                error => GenerationError::InsertFailed(error),
            })?;

    tracing::info!(
        event = "transaction.generated",
        kind = %kind,
        template_id = template.id,
        transaction_id = transaction.id,
        account_id = template.account_id,
        %date,
        amount = transaction.amount,
        currency = %transaction.currency,
        "generated {kind} from template"
    );

    Ok(transaction.id)
}
