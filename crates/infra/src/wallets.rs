//! `WalletService`: the single entry point the API layer talks to.
//!
//! Forwards wallet CRUD to the store, runs mutations through the
//! [`MutationProtocol`], and applies currency conversion on the read path.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use ewallet_core::{
    Amount, IdempotencyKey, LedgerRecord, LedgerResult, TransactionQuery, Wallet, WalletDraft,
    WalletId,
};

use crate::exchange::{CurrencyConverter, normalize_currency};
use crate::ledger_store::LedgerStore;
use crate::mutation::MutationProtocol;

#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
    exchange: Arc<dyn CurrencyConverter>,
    protocol: MutationProtocol<dyn LedgerStore>,
}

impl WalletService {
    pub fn new(store: Arc<dyn LedgerStore>, exchange: Arc<dyn CurrencyConverter>) -> Self {
        Self {
            protocol: MutationProtocol::new(Arc::clone(&store)),
            store,
            exchange,
        }
    }

    pub async fn create_wallet(&self, draft: &WalletDraft) -> LedgerResult<WalletId> {
        self.store.create_wallet(draft).await
    }

    /// Fetch a wallet; with `currency`, the returned balance is converted.
    ///
    /// The stored balance is never modified by conversion.
    #[instrument(skip(self), fields(wallet_id = %id), err)]
    pub async fn get_wallet(&self, id: WalletId, currency: Option<&str>) -> LedgerResult<Wallet> {
        let mut wallet = self.store.get_wallet(id).await?;
        if let Some(code) = currency {
            let code = normalize_currency(code)?;
            wallet.balance = self.exchange.convert(&code, wallet.balance).await?;
        }
        Ok(wallet)
    }

    pub async fn update_wallet(&self, id: WalletId, draft: &WalletDraft) -> LedgerResult<Wallet> {
        self.store.update_wallet(id, draft).await
    }

    pub async fn delete_wallet(&self, id: WalletId) -> LedgerResult<()> {
        self.store.delete_wallet(id).await
    }

    pub async fn freeze(&self, id: WalletId) -> LedgerResult<()> {
        self.store.freeze(id).await
    }

    pub async fn unfreeze(&self, id: WalletId) -> LedgerResult<()> {
        self.store.unfreeze(id).await
    }

    pub async fn deposit(
        &self,
        wallet: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        self.protocol.deposit(wallet, amount, key).await
    }

    pub async fn withdraw(
        &self,
        wallet: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        self.protocol.withdraw(wallet, amount, key).await
    }

    pub async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: Amount,
        key: IdempotencyKey,
    ) -> LedgerResult<()> {
        self.protocol.transfer(from, to, amount, key).await
    }

    /// History of `wallet` (source or target). Missing wallet → not found.
    pub async fn transactions(
        &self,
        wallet: WalletId,
        query: &TransactionQuery,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        self.store.list_transactions(wallet, query).await
    }

    /// Value of one unit of the base currency in `currency`.
    #[instrument(skip(self), err)]
    pub async fn rate(&self, currency: &str) -> LedgerResult<Decimal> {
        let code = normalize_currency(currency)?;
        Ok(self.exchange.convert(&code, Decimal::ONE).await?)
    }
}
