//! Ledger records and CSV ingestion

mod data;
pub mod loader;

pub use data::{Frequency, RecurringTransaction, Transaction, TransactionType};
pub use loader::{
    load_balances, load_balances_from_reader,
    load_recurring, load_recurring_from_reader, load_scenarios, load_scenarios_from_reader,
    load_transactions, load_transactions_from_reader, load_user_recurring_from_reader,
    load_user_transactions_from_reader,
};
