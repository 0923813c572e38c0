//! Expenses and incomes, entered by hand or generated from recurring
//! templates.
//!
//! This module contains the `Transaction` model, the `TransactionBuilder`
//! used to create transactions and the database functions for storing and
//! querying them.

mod core;

pub use core::{
    Transaction, TransactionBuilder, TransactionType, count_generated_transactions,
    count_transactions, create_transaction, create_transaction_table,
    generated_transaction_exists, get_generated_transactions, get_transaction,
};
