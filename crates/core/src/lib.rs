//! `ewallet-core` — ledger domain building blocks.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, amounts, wallets, ledger records, mutation requests and the
//! error taxonomy shared by every layer.

pub mod error;
pub mod id;
pub mod money;
pub mod mutation;
pub mod query;
pub mod record;
pub mod wallet;

pub use error::{LedgerError, LedgerResult};
pub use id::{IdempotencyKey, TransactionId, WalletId};
pub use money::Amount;
pub use mutation::{Mutation, MutationKind};
pub use query::{SortKey, SortOrder, TransactionQuery};
pub use record::{LedgerRecord, NewLedgerRecord, Operation};
pub use wallet::{Wallet, WalletDraft};
