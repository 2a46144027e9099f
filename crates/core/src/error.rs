//! Ledger error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{IdempotencyKey, WalletId};

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Stores classify their own failures into these variants (a unique-key
/// conflict becomes `DuplicateKey`, a missing row becomes `WalletNotFound`);
/// raw storage error types never cross the store boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The wallet an operation targets does not exist.
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    /// The receiving side of a transfer does not exist.
    #[error("target wallet {0} not found")]
    TargetWalletNotFound(WalletId),

    /// The idempotency key was already used by an earlier request.
    #[error("duplicate idempotency key {0}")]
    DuplicateKey(IdempotencyKey),

    /// A withdrawal or outgoing transfer exceeds the current balance.
    #[error("insufficient funds in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet_id: WalletId,
        balance: Decimal,
        requested: Decimal,
    },

    /// The wallet is frozen and rejects balance mutations.
    #[error("wallet {0} is frozen")]
    WalletFrozen(WalletId),

    /// Malformed identifier, amount, key or query parameter.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The currency collaborator does not know the requested code.
    #[error("currency not found: {0}")]
    CurrencyNotFound(String),

    /// The currency collaborator failed for any other reason.
    #[error("currency lookup failed: {0}")]
    Exchange(String),

    /// Transport, connectivity or unclassified constraint failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for both source and target not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WalletNotFound(_) | Self::TargetWalletNotFound(_))
    }

    /// Whether the caller cannot tell if the mutation was applied.
    ///
    /// Only storage failures qualify: the atomic unit may have committed
    /// before the transport failed. Retrying with the same idempotency key
    /// is the recovery path.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
