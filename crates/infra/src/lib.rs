//! Infrastructure layer: ledger stores, mutation protocol, currency
//! conversion, configuration.

pub mod config;
pub mod exchange;
pub mod ledger_store;
pub mod mutation;
pub mod wallets;


pub use config::{ConfigError, ExchangeConfig, LedgerConfig, StorageBackend};
pub use exchange::{CurrencyConverter, ExchangeError, FixedRates, HttpExchangeRate};
pub use ledger_store::{AtomicUnit, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
pub use mutation::MutationProtocol;
pub use wallets::WalletService;
