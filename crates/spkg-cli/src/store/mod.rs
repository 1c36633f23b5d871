//! Persistent state.

pub mod ledger;

pub use ledger::{Ledger, LedgerEntry, LedgerError};
