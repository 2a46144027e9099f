//! Balance-mutating requests (deposit, withdraw, transfer).

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::id::{IdempotencyKey, WalletId};
use crate::money::Amount;
use crate::record::{NewLedgerRecord, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Deposit,
    Withdraw,
    Transfer { target: WalletId },
}

/// One money movement, ready to be run as an atomic unit.
///
/// `wallet_id` is the source: the wallet whose frozen flag gates the request
/// and, for withdrawals and transfers, whose balance is checked and debited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub wallet_id: WalletId,
    pub amount: Amount,
    pub key: IdempotencyKey,
    pub kind: MutationKind,
}

impl Mutation {
    pub fn deposit(wallet_id: WalletId, amount: Amount, key: IdempotencyKey) -> Self {
        Self {
            wallet_id,
            amount,
            key,
            kind: MutationKind::Deposit,
        }
    }

    pub fn withdraw(wallet_id: WalletId, amount: Amount, key: IdempotencyKey) -> Self {
        Self {
            wallet_id,
            amount,
            key,
            kind: MutationKind::Withdraw,
        }
    }

    /// Transfer from `wallet_id` to `target`. A wallet cannot pay itself.
    pub fn transfer(
        wallet_id: WalletId,
        target: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<Self> {
        if wallet_id == target {
            return Err(LedgerError::validation(
                "transfer target must differ from the source wallet",
            ));
        }
        Ok(Self {
            wallet_id,
            amount,
            key,
            kind: MutationKind::Transfer { target },
        })
    }

    pub fn operation(&self) -> Operation {
        match self.kind {
            MutationKind::Deposit => Operation::Deposit,
            MutationKind::Withdraw => Operation::Withdraw,
            MutationKind::Transfer { .. } => Operation::Transfer,
        }
    }

    pub fn target(&self) -> Option<WalletId> {
        match self.kind {
            MutationKind::Transfer { target } => Some(target),
            MutationKind::Deposit | MutationKind::Withdraw => None,
        }
    }

    /// Whether the source balance is checked and decremented.
    pub fn debits_source(&self) -> bool {
        !matches!(self.kind, MutationKind::Deposit)
    }

    /// The ledger row this mutation writes.
    pub fn to_record(&self) -> NewLedgerRecord {
        NewLedgerRecord {
            key: self.key,
            from_id: self.wallet_id,
            to_id: self.target(),
            operation: self.operation(),
            amount: self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn self_transfer_is_rejected() {
        let w = WalletId::new(7);
        let amount = Amount::new(dec!(1)).unwrap();
        let err = Mutation::transfer(w, w, amount, IdempotencyKey::generate()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn record_carries_target_only_for_transfers() {
        let amount = Amount::new(dec!(600)).unwrap();
        let deposit = Mutation::deposit(WalletId::new(1), amount, IdempotencyKey::generate());
        assert_eq!(deposit.to_record().to_id, None);
        assert!(!deposit.debits_source());

        let transfer =
            Mutation::transfer(WalletId::new(1), WalletId::new(2), amount, IdempotencyKey::generate())
                .unwrap();
        let rec = transfer.to_record();
        assert_eq!(rec.to_id, Some(WalletId::new(2)));
        assert_eq!(rec.operation, Operation::Transfer);
        assert!(transfer.debits_source());
    }
}
