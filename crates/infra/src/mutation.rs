//! Mutation protocol: deposit, withdraw and transfer as atomic units.
//!
//! ```text
//! Mutation
//!   ↓
//! 1. Begin atomic unit
//!   ↓
//! 2. Frozen check on the source wallet (missing source → WalletNotFound)
//!   ↓
//! 3. Record ledger row (reused idempotency key → DuplicateKey)
//!   ↓
//! 4. Withdraw/transfer only: lock source row, check balance ≥ amount
//!   ↓
//! 5. Apply deltas: source first, then target (zero rows → not found)
//!   ↓
//! 6. Commit
//! ```
//!
//! Any failure rolls the whole unit back; the ledger row from step 3 goes
//! with it. The balance check and the decrement run under the same row lock,
//! so concurrent debits of one wallet cannot both pass the check.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{instrument, warn};

use ewallet_core::{Amount, IdempotencyKey, LedgerError, LedgerResult, Mutation, WalletId};

use crate::ledger_store::{AtomicUnit, LedgerStore};

/// Runs [`Mutation`]s against a [`LedgerStore`].
///
/// Holds no state of its own; cross-request coordination is entirely the
/// store's row locks and unique index.
#[derive(Debug)]
pub struct MutationProtocol<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for MutationProtocol<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore + ?Sized> MutationProtocol<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn deposit(
        &self,
        wallet: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        self.apply(&Mutation::deposit(wallet, amount, key)).await
    }

    pub async fn withdraw(
        &self,
        wallet: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        self.apply(&Mutation::withdraw(wallet, amount, key)).await
    }

    pub async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        let mutation = Mutation::transfer(from, to, amount, key)?;
        self.apply(&mutation).await
    }

    /// Run one mutation to completion: committed, or rolled back with the
    /// triggering error returned.
    ///
    /// Dropping the returned future before it resolves drops the atomic unit,
    /// which rolls it back.
    #[instrument(
        skip(self, mutation),
        fields(
            wallet_id = %mutation.wallet_id,
            operation = %mutation.operation(),
            key = %mutation.key,
            amount = %mutation.amount,
            target = ?mutation.target()
        ),
        err
    )]
    pub async fn apply(&self, mutation: &Mutation) -> LedgerResult<()> {
        let mut unit = self.store.begin().await?;

        let outcome = run_steps(unit.as_mut(), mutation).await;
        match outcome {
            Ok(()) => unit.commit().await,
            Err(err) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(
                        wallet_id = %mutation.wallet_id,
                        key = %mutation.key,
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}

async fn run_steps(unit: &mut (dyn AtomicUnit + '_), mutation: &Mutation) -> LedgerResult<()> {
    let source = mutation.wallet_id;
    let amount = mutation.amount.value();

    if unit.is_frozen(source).await? {
        return Err(LedgerError::WalletFrozen(source));
    }

    unit.record_transaction(&mutation.to_record()).await?;

    if mutation.debits_source() {
        let balance = unit.lock_wallet_for_update(source).await?;
        if balance < amount {
            return Err(LedgerError::InsufficientFunds {
                wallet_id: source,
                balance,
                requested: amount,
            });
        }
        adjust(unit, source, -amount, LedgerError::WalletNotFound(source)).await?;
    } else {
        adjust(unit, source, amount, LedgerError::WalletNotFound(source)).await?;
    }

    if let Some(target) = mutation.target() {
        adjust(unit, target, amount, LedgerError::TargetWalletNotFound(target)).await?;
    }

    Ok(())
}

async fn adjust(
    unit: &mut (dyn AtomicUnit + '_),
    wallet: WalletId,
    delta: Decimal,
    missing: LedgerError,
) -> LedgerResult<()> {
    match unit.adjust_balance(wallet, delta).await? {
        0 => Err(missing),
        _ => Ok(()),
    }
}
