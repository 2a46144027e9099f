//! Ledger persistence: wallets, append-only ledger records, atomic units.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{AtomicUnit, LedgerStore};
