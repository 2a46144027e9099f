//! Wallet entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::WalletId;

/// An account holding a monetary balance.
///
/// The balance is maintained incrementally by the mutation protocol; the
/// ledger records are the audit trail, not the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub frozen: bool,
}

/// Caller-supplied wallet fields, used for creation and full overwrite.
///
/// The balance is not validated here: creation and update take whatever the
/// caller sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDraft {
    pub owner: String,
    pub balance: Decimal,
}

impl WalletDraft {
    pub fn new(owner: impl Into<String>, balance: Decimal) -> Self {
        Self {
            owner: owner.into(),
            balance,
        }
    }
}
