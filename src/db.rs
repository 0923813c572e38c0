//! Sets up the application's database.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, account::create_account_table, currency::create_exchange_rate_table,
    template::{TemplateKind, create_template_table},
    transaction::create_transaction_table,
};

/// Enable foreign keys and create every table that does not exist yet.
///
/// The tables are created in one exclusive transaction, so a database is
/// either fully initialised or left untouched.
///
/// # Errors
/// Returns an [Error::SqlError] if any table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_exchange_rate_table(&transaction)?;

    for kind in TemplateKind::ALL {
        create_template_table(kind, &transaction)?;
        create_transaction_table(kind, &transaction)?;
    }

    transaction.commit()?;

    Ok(())
}
