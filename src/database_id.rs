//! Database ID type definition.

/// Database identifier for a generated or manually entered expense or income.
pub type TransactionId = i64;
