//! Immutable ledger records (the transaction table).

use chrono::{DateTime, Utc};
use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::id::{IdempotencyKey, TransactionId, WalletId};
use crate::money::Amount;

/// Kind of money movement a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Deposit,
    Withdraw,
    Transfer,
}

impl Operation {
    /// Stored/wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Transfer => "transfer",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Operation::Deposit),
            "withdraw" => Ok(Operation::Withdraw),
            "transfer" => Ok(Operation::Transfer),
            other => Err(LedgerError::validation(format!("unknown operation '{other}'"))),
        }
    }
}

/// A ledger row about to be inserted (the store assigns `id` and `date`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerRecord {
    pub key: IdempotencyKey,
    pub from_id: WalletId,
    /// Set for transfers only.
    pub to_id: Option<WalletId>,
    pub operation: Operation,
    pub amount: Amount,
}

/// A committed ledger row. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: TransactionId,
    pub key: IdempotencyKey,
    pub from_id: WalletId,
    pub to_id: Option<WalletId>,
    pub operation: Operation,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

impl LedgerRecord {
    /// Whether this record references `wallet` as source or target.
    pub fn involves(&self, wallet: WalletId) -> bool {
        self.from_id == wallet || self.to_id == Some(wallet)
    }

    /// Signed balance change this record caused on `wallet`.
    ///
    /// Deposits name the credited wallet in `from_id`, so the sign depends on
    /// the operation and not only on the column.
    pub fn effect_on(&self, wallet: WalletId) -> Decimal {
        let mut effect = Decimal::ZERO;
        if self.from_id == wallet {
            effect += match self.operation {
                Operation::Deposit => self.amount,
                Operation::Withdraw | Operation::Transfer => -self.amount,
            };
        }
        if self.operation == Operation::Transfer && self.to_id == Some(wallet) {
            effect += self.amount;
        }
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(operation: Operation, from: i64, to: Option<i64>, amount: Decimal) -> LedgerRecord {
        LedgerRecord {
            id: TransactionId::new(1),
            key: IdempotencyKey::generate(),
            from_id: WalletId::new(from),
            to_id: to.map(WalletId::new),
            operation,
            amount,
            date: Utc::now(),
        }
    }

    #[test]
    fn effect_follows_operation_kind() {
        let a = WalletId::new(1);
        let b = WalletId::new(2);

        assert_eq!(record(Operation::Deposit, 1, None, dec!(10)).effect_on(a), dec!(10));
        assert_eq!(record(Operation::Withdraw, 1, None, dec!(10)).effect_on(a), dec!(-10));

        let transfer = record(Operation::Transfer, 1, Some(2), dec!(600));
        assert_eq!(transfer.effect_on(a), dec!(-600));
        assert_eq!(transfer.effect_on(b), dec!(600));
        assert_eq!(transfer.effect_on(WalletId::new(3)), Decimal::ZERO);
        assert!(transfer.involves(b));
    }

    #[test]
    fn operation_round_trips_through_its_stored_spelling() {
        for op in [Operation::Deposit, Operation::Withdraw, Operation::Transfer] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("refund".parse::<Operation>().is_err());
        assert_eq!(serde_json::to_string(&Operation::Withdraw).unwrap(), "\"withdraw\"");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a transfer moves money without creating or destroying it.
            #[test]
            fn transfer_effects_cancel_out(
                from in 1i64..1000,
                offset in 1i64..1000,
                cents in 1i64..10_000_000
            ) {
                let to = from + offset;
                let amount = Decimal::new(cents, 2);
                let r = record(Operation::Transfer, from, Some(to), amount);
                prop_assert_eq!(
                    r.effect_on(WalletId::new(from)) + r.effect_on(WalletId::new(to)),
                    Decimal::ZERO
                );
                prop_assert_eq!(r.effect_on(WalletId::new(to)), amount);
            }
        }
    }
}
