use async_trait::async_trait;
use rust_decimal::Decimal;

use ewallet_core::{
    LedgerRecord, LedgerResult, NewLedgerRecord, TransactionQuery, Wallet, WalletDraft, WalletId,
};

/// Durable, constraint-enforcing persistence for wallets and ledger records.
///
/// The `LedgerStore` is the **persistence layer** of the ledger. Plain wallet
/// reads and writes run as their own statements; balance mutations run inside
/// an [`AtomicUnit`] obtained from [`LedgerStore::begin`].
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - Classify failures into `LedgerError` (missing rows are `WalletNotFound`,
///   a reused idempotency key is `DuplicateKey`, anything else is `Storage`)
/// - Keep ledger records append-only (no update or delete path)
/// - Keep ledger records when a wallet is deleted
/// - Provide an exclusive per-wallet lock through
///   [`AtomicUnit::lock_wallet_for_update`], held until the unit ends
///
/// Any backend offering locking reads or serializable isolation satisfies
/// the contract; `InMemoryLedgerStore` (tests/dev) and `PostgresLedgerStore`
/// (production) are provided.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a wallet and return its assigned ID.
    async fn create_wallet(&self, draft: &WalletDraft) -> LedgerResult<WalletId>;

    async fn get_wallet(&self, id: WalletId) -> LedgerResult<Wallet>;

    /// Overwrite owner and balance, refreshing `updated_at`.
    async fn update_wallet(&self, id: WalletId, draft: &WalletDraft) -> LedgerResult<Wallet>;

    /// Hard delete. Ledger records referencing the wallet survive.
    async fn delete_wallet(&self, id: WalletId) -> LedgerResult<()>;

    async fn freeze(&self, id: WalletId) -> LedgerResult<()>;

    async fn unfreeze(&self, id: WalletId) -> LedgerResult<()>;

    /// Start an atomic unit. Dropping it without `commit` rolls it back.
    async fn begin<'a>(&'a self) -> LedgerResult<Box<dyn AtomicUnit + 'a>>;

    /// Records where `wallet` is source or target, sorted and paginated.
    ///
    /// Fails with `WalletNotFound` when the wallet does not exist.
    async fn list_transactions(
        &self,
        wallet: WalletId,
        query: &TransactionQuery,
    ) -> LedgerResult<Vec<LedgerRecord>>;
}

/// A unit of work that is entirely applied or entirely discarded.
///
/// Every method reads its own uncommitted writes. Row locks taken by
/// `lock_wallet_for_update` are released when the unit commits, rolls back
/// or is dropped.
#[async_trait]
pub trait AtomicUnit: Send {
    /// Frozen flag of `wallet`; `WalletNotFound` if it does not exist.
    async fn is_frozen(&mut self, wallet: WalletId) -> LedgerResult<bool>;

    /// Take the exclusive row lock on `wallet` and return its balance.
    async fn lock_wallet_for_update(&mut self, wallet: WalletId) -> LedgerResult<Decimal>;

    /// Insert a ledger row; `DuplicateKey` if its idempotency key exists.
    async fn record_transaction(&mut self, record: &NewLedgerRecord) -> LedgerResult<()>;

    /// Apply `balance += delta`. Returns the number of rows affected; zero
    /// means the wallet does not exist.
    async fn adjust_balance(&mut self, wallet: WalletId, delta: Decimal) -> LedgerResult<u64>;

    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    async fn rollback(self: Box<Self>) -> LedgerResult<()>;
}
