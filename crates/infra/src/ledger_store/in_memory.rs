use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use ewallet_core::{
    IdempotencyKey, LedgerError, LedgerRecord, LedgerResult, NewLedgerRecord, SortKey, SortOrder,
    TransactionId, TransactionQuery, Wallet, WalletDraft, WalletId,
};

use super::r#trait::{AtomicUnit, LedgerStore};

#[derive(Debug, Default)]
struct Tables {
    wallets: BTreeMap<WalletId, Wallet>,
    records: Vec<LedgerRecord>,
    /// Committed keys plus keys reserved by in-flight units.
    keys: HashSet<IdempotencyKey>,
    last_wallet_id: i64,
    last_record_id: i64,
}

type RowLock = Arc<tokio::sync::Mutex<()>>;

/// In-memory ledger store.
///
/// Intended for tests/dev. Tables sit behind one `RwLock` that is never held
/// across an `.await`; each wallet row additionally has its own async mutex
/// acting as the exclusive row lock, so units touching disjoint wallets do not
/// wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<WalletId, RowLock>>,
}

fn poisoned() -> LedgerError {
    LedgerError::storage("lock poisoned")
}

fn overflow(wallet: WalletId) -> LedgerError {
    LedgerError::validation(format!("balance of wallet {wallet} is out of range"))
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed ledger record, in insertion order.
    pub fn all_records(&self) -> LedgerResult<Vec<LedgerRecord>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.records.clone())
    }

    /// Whether `key` is committed or reserved by an in-flight unit.
    #[cfg(test)]
    pub(crate) fn key_in_use(&self, key: IdempotencyKey) -> bool {
        self.tables.read().unwrap().keys.contains(&key)
    }

    /// Row lock for an existing wallet. The existence check runs under the
    /// `row_locks` mutex so a concurrent delete cannot leave a stale entry.
    fn row_lock(&self, wallet: WalletId) -> LedgerResult<RowLock> {
        let mut locks = self.row_locks.lock().map_err(|_| poisoned())?;
        let exists = self
            .tables
            .read()
            .map_err(|_| poisoned())?
            .wallets
            .contains_key(&wallet);
        if !exists {
            return Err(LedgerError::WalletNotFound(wallet));
        }
        Ok(locks.entry(wallet).or_default().clone())
    }

    /// Wait for any in-flight unit holding `wallet`'s row lock.
    async fn acquire_row(&self, wallet: WalletId) -> LedgerResult<OwnedMutexGuard<()>> {
        let lock = self.row_lock(wallet)?;
        Ok(lock.lock_owned().await)
    }

    fn with_wallet_mut<T>(
        &self,
        id: WalletId,
        f: impl FnOnce(&mut Wallet) -> T,
    ) -> LedgerResult<T> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let wallet = tables
            .wallets
            .get_mut(&id)
            .ok_or(LedgerError::WalletNotFound(id))?;
        Ok(f(wallet))
    }

    async fn set_frozen(&self, id: WalletId, frozen: bool) -> LedgerResult<()> {
        let _row = self.acquire_row(id).await?;
        self.with_wallet_mut(id, |w| {
            w.frozen = frozen;
            w.updated_at = Utc::now();
        })
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_wallet(&self, draft: &WalletDraft) -> LedgerResult<WalletId> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.last_wallet_id += 1;
        let id = WalletId::new(tables.last_wallet_id);
        let now = Utc::now();
        tables.wallets.insert(
            id,
            Wallet {
                id,
                owner: draft.owner.clone(),
                balance: draft.balance,
                created_at: now,
                updated_at: now,
                frozen: false,
            },
        );
        Ok(id)
    }

    async fn get_wallet(&self, id: WalletId) -> LedgerResult<Wallet> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        tables
            .wallets
            .get(&id)
            .cloned()
            .ok_or(LedgerError::WalletNotFound(id))
    }

    async fn update_wallet(&self, id: WalletId, draft: &WalletDraft) -> LedgerResult<Wallet> {
        let _row = self.acquire_row(id).await?;
        self.with_wallet_mut(id, |w| {
            w.owner = draft.owner.clone();
            w.balance = draft.balance;
            w.updated_at = Utc::now();
            w.clone()
        })
    }

    async fn delete_wallet(&self, id: WalletId) -> LedgerResult<()> {
        let _row = self.acquire_row(id).await?;
        {
            let mut tables = self.tables.write().map_err(|_| poisoned())?;
            tables
                .wallets
                .remove(&id)
                .ok_or(LedgerError::WalletNotFound(id))?;
        }
        // Waiters still hold their own clone of the lock; IDs are never reused.
        self.row_locks.lock().map_err(|_| poisoned())?.remove(&id);
        Ok(())
    }

    async fn freeze(&self, id: WalletId) -> LedgerResult<()> {
        self.set_frozen(id, true).await
    }

    async fn unfreeze(&self, id: WalletId) -> LedgerResult<()> {
        self.set_frozen(id, false).await
    }

    async fn begin<'a>(&'a self) -> LedgerResult<Box<dyn AtomicUnit + 'a>> {
        Ok(Box::new(InMemoryUnit {
            store: self,
            held: HashMap::new(),
            reserved: Vec::new(),
            records: Vec::new(),
            deltas: Vec::new(),
            finished: false,
        }))
    }

    async fn list_transactions(
        &self,
        wallet: WalletId,
        query: &TransactionQuery,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        if !tables.wallets.contains_key(&wallet) {
            return Err(LedgerError::WalletNotFound(wallet));
        }

        let mut records: Vec<LedgerRecord> = tables
            .records
            .iter()
            .filter(|r| r.involves(wallet))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            let primary = match query.sort {
                SortKey::Amount => a.amount.cmp(&b.amount),
                SortKey::Date => a.date.cmp(&b.date),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        if query.order == SortOrder::Desc {
            records.reverse();
        }

        Ok(records
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }
}

/// Atomic unit over the in-memory tables.
///
/// Writes are staged and applied in one step at commit. Idempotency keys are
/// reserved in the shared key set as soon as they are recorded, so a
/// concurrent unit using the same key fails with `DuplicateKey` right away.
struct InMemoryUnit<'a> {
    store: &'a InMemoryLedgerStore,
    held: HashMap<WalletId, OwnedMutexGuard<()>>,
    reserved: Vec<IdempotencyKey>,
    records: Vec<NewLedgerRecord>,
    deltas: Vec<(WalletId, Decimal)>,
    finished: bool,
}

impl InMemoryUnit<'_> {
    /// `committed` plus every delta this unit staged for `wallet`.
    fn staged_balance(&self, wallet: WalletId, committed: Decimal) -> LedgerResult<Decimal> {
        self.deltas
            .iter()
            .filter(|(w, _)| *w == wallet)
            .try_fold(committed, |acc, (_, d)| {
                acc.checked_add(*d).ok_or_else(|| overflow(wallet))
            })
    }

    fn release_keys(&mut self) {
        if self.reserved.is_empty() {
            return;
        }
        if let Ok(mut tables) = self.store.tables.write() {
            for key in self.reserved.drain(..) {
                tables.keys.remove(&key);
            }
        }
    }

    fn apply(&mut self) -> LedgerResult<()> {
        let mut tables = self.store.tables.write().map_err(|_| poisoned())?;

        // Resolve every new balance before writing any of them.
        let mut balances: HashMap<WalletId, Decimal> = HashMap::new();
        for (wallet, delta) in &self.deltas {
            let current = match balances.get(wallet) {
                Some(balance) => *balance,
                None => tables
                    .wallets
                    .get(wallet)
                    .map(|w| w.balance)
                    .ok_or(LedgerError::WalletNotFound(*wallet))?,
            };
            let next = current.checked_add(*delta).ok_or_else(|| overflow(*wallet))?;
            balances.insert(*wallet, next);
        }

        let now = Utc::now();
        for (wallet, balance) in balances {
            if let Some(w) = tables.wallets.get_mut(&wallet) {
                w.balance = balance;
                w.updated_at = now;
            }
        }
        for record in self.records.drain(..) {
            tables.last_record_id += 1;
            let id = TransactionId::new(tables.last_record_id);
            tables.records.push(LedgerRecord {
                id,
                key: record.key,
                from_id: record.from_id,
                to_id: record.to_id,
                operation: record.operation,
                amount: record.amount.value(),
                date: now,
            });
        }
        self.reserved.clear();
        Ok(())
    }
}

#[async_trait]
impl AtomicUnit for InMemoryUnit<'_> {
    async fn is_frozen(&mut self, wallet: WalletId) -> LedgerResult<bool> {
        let tables = self.store.tables.read().map_err(|_| poisoned())?;
        tables
            .wallets
            .get(&wallet)
            .map(|w| w.frozen)
            .ok_or(LedgerError::WalletNotFound(wallet))
    }

    async fn lock_wallet_for_update(&mut self, wallet: WalletId) -> LedgerResult<Decimal> {
        if !self.held.contains_key(&wallet) {
            let guard = self.store.acquire_row(wallet).await?;
            self.held.insert(wallet, guard);
        }

        let committed = {
            let tables = self.store.tables.read().map_err(|_| poisoned())?;
            tables
                .wallets
                .get(&wallet)
                .map(|w| w.balance)
                .ok_or(LedgerError::WalletNotFound(wallet))?
        };
        self.staged_balance(wallet, committed)
    }

    async fn record_transaction(&mut self, record: &NewLedgerRecord) -> LedgerResult<()> {
        let mut tables = self.store.tables.write().map_err(|_| poisoned())?;
        if !tables.keys.insert(record.key) {
            return Err(LedgerError::DuplicateKey(record.key));
        }
        self.reserved.push(record.key);
        self.records.push(record.clone());
        Ok(())
    }

    async fn adjust_balance(&mut self, wallet: WalletId, delta: Decimal) -> LedgerResult<u64> {
        let exists = {
            let tables = self.store.tables.read().map_err(|_| poisoned())?;
            tables.wallets.contains_key(&wallet)
        };
        if !exists {
            return Ok(0);
        }
        self.deltas.push((wallet, delta));
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let mut unit = self;
        unit.apply()?;
        unit.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        let mut unit = self;
        unit.release_keys();
        unit.finished = true;
        Ok(())
    }
}

impl Drop for InMemoryUnit<'_> {
    fn drop(&mut self) {
        // Dropped mid-flight (error path or cancelled future): discard staged
        // writes and give the keys back. Row guards release on their own.
        if !self.finished {
            self.release_keys();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ewallet_core::{Amount, Operation};
    use rust_decimal_macros::dec;

    fn record(key: IdempotencyKey, from: WalletId, amount: Decimal) -> NewLedgerRecord {
        NewLedgerRecord {
            key,
            from_id: from,
            to_id: None,
            operation: Operation::Deposit,
            amount: Amount::new(amount).unwrap(),
        }
    }

    #[tokio::test]
    async fn wallet_crud_round_trip() {
        let store = InMemoryLedgerStore::new();
        let id = store
            .create_wallet(&WalletDraft::new("alice", dec!(1050)))
            .await
            .unwrap();

        let w = store.get_wallet(id).await.unwrap();
        assert_eq!(w.owner, "alice");
        assert_eq!(w.balance, dec!(1050));
        assert!(!w.frozen);

        let updated = store
            .update_wallet(id, &WalletDraft::new("bob", dec!(-5)))
            .await
            .unwrap();
        assert_eq!(updated.owner, "bob");
        assert_eq!(updated.balance, dec!(-5));
        assert!(updated.updated_at >= w.updated_at);

        store.freeze(id).await.unwrap();
        assert!(store.get_wallet(id).await.unwrap().frozen);
        store.unfreeze(id).await.unwrap();
        assert!(!store.get_wallet(id).await.unwrap().frozen);

        store.delete_wallet(id).await.unwrap();
        assert_eq!(
            store.get_wallet(id).await.unwrap_err(),
            LedgerError::WalletNotFound(id)
        );
        assert_eq!(
            store.delete_wallet(id).await.unwrap_err(),
            LedgerError::WalletNotFound(id)
        );
        assert!(store.freeze(id).await.is_err());
    }

    #[tokio::test]
    async fn dropped_unit_leaves_no_trace() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_wallet(&WalletDraft::new("a", dec!(10))).await.unwrap();
        let key = IdempotencyKey::generate();

        {
            let mut unit = store.begin().await.unwrap();
            unit.record_transaction(&record(key, id, dec!(5))).await.unwrap();
            assert_eq!(unit.adjust_balance(id, dec!(5)).await.unwrap(), 1);
            assert_eq!(unit.lock_wallet_for_update(id).await.unwrap(), dec!(15));
        }

        assert_eq!(store.get_wallet(id).await.unwrap().balance, dec!(10));
        assert!(store.all_records().unwrap().is_empty());

        // The key was released, so it can be used again.
        let mut unit = store.begin().await.unwrap();
        unit.record_transaction(&record(key, id, dec!(5))).await.unwrap();
        unit.adjust_balance(id, dec!(5)).await.unwrap();
        unit.commit().await.unwrap();
        assert_eq!(store.get_wallet(id).await.unwrap().balance, dec!(15));
        assert_eq!(store.all_records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_across_units() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_wallet(&WalletDraft::new("a", dec!(0))).await.unwrap();
        let key = IdempotencyKey::generate();

        let mut first = store.begin().await.unwrap();
        first.record_transaction(&record(key, id, dec!(1))).await.unwrap();

        // In flight: the reservation already blocks the key.
        let mut second = store.begin().await.unwrap();
        assert_eq!(
            second.record_transaction(&record(key, id, dec!(1))).await.unwrap_err(),
            LedgerError::DuplicateKey(key)
        );
        second.rollback().await.unwrap();

        first.commit().await.unwrap();

        let mut third = store.begin().await.unwrap();
        assert_eq!(
            third.record_transaction(&record(key, id, dec!(1))).await.unwrap_err(),
            LedgerError::DuplicateKey(key)
        );
    }

    #[tokio::test]
    async fn overflowing_commit_leaves_store_untouched_and_usable() {
        let store = InMemoryLedgerStore::new();
        let near_max = Decimal::MAX - dec!(1);
        let big = store.create_wallet(&WalletDraft::new("big", near_max)).await.unwrap();
        let other = store.create_wallet(&WalletDraft::new("other", dec!(10))).await.unwrap();
        let key = IdempotencyKey::generate();

        let mut unit = store.begin().await.unwrap();
        unit.record_transaction(&record(key, big, dec!(1000))).await.unwrap();
        unit.adjust_balance(other, dec!(5)).await.unwrap();
        unit.adjust_balance(big, dec!(1000)).await.unwrap();
        assert!(matches!(
            unit.commit().await.unwrap_err(),
            LedgerError::Validation(_)
        ));

        assert_eq!(store.get_wallet(big).await.unwrap().balance, near_max);
        assert_eq!(store.get_wallet(other).await.unwrap().balance, dec!(10));
        assert!(store.all_records().unwrap().is_empty());

        // Tables are not poisoned and the key was released.
        let mut unit = store.begin().await.unwrap();
        unit.record_transaction(&record(key, other, dec!(1))).await.unwrap();
        unit.adjust_balance(other, dec!(1)).await.unwrap();
        unit.commit().await.unwrap();
        assert_eq!(store.get_wallet(other).await.unwrap().balance, dec!(11));
    }

    #[tokio::test]
    async fn locked_read_reports_out_of_range_staged_balance() {
        let store = InMemoryLedgerStore::new();
        let id = store
            .create_wallet(&WalletDraft::new("big", Decimal::MAX))
            .await
            .unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.adjust_balance(id, dec!(1)).await.unwrap();
        assert!(matches!(
            unit.lock_wallet_for_update(id).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn row_locks_are_not_kept_for_missing_or_deleted_wallets() {
        let store = InMemoryLedgerStore::new();
        let ghost = WalletId::new(404);

        assert!(store.freeze(ghost).await.is_err());
        assert!(store.unfreeze(ghost).await.is_err());
        assert!(store.update_wallet(ghost, &WalletDraft::new("x", dec!(1))).await.is_err());
        assert!(store.delete_wallet(ghost).await.is_err());
        {
            let mut unit = store.begin().await.unwrap();
            assert!(unit.lock_wallet_for_update(ghost).await.is_err());
        }
        assert!(store.row_locks.lock().unwrap().is_empty());

        let id = store.create_wallet(&WalletDraft::new("a", dec!(1))).await.unwrap();
        store.freeze(id).await.unwrap();
        assert_eq!(store.row_locks.lock().unwrap().len(), 1);
        store.delete_wallet(id).await.unwrap();
        assert!(store.row_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn adjust_on_missing_wallet_affects_no_rows() {
        let store = InMemoryLedgerStore::new();
        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.adjust_balance(WalletId::new(99), dec!(1)).await.unwrap(), 0);
        assert_eq!(
            unit.is_frozen(WalletId::new(99)).await.unwrap_err(),
            LedgerError::WalletNotFound(WalletId::new(99))
        );
    }

    #[tokio::test]
    async fn commit_fails_whole_unit_if_wallet_vanished() {
        let store = InMemoryLedgerStore::new();
        let a = store.create_wallet(&WalletDraft::new("a", dec!(10))).await.unwrap();
        let b = store.create_wallet(&WalletDraft::new("b", dec!(10))).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.record_transaction(&record(IdempotencyKey::generate(), a, dec!(1)))
            .await
            .unwrap();
        unit.adjust_balance(a, dec!(1)).await.unwrap();
        unit.adjust_balance(b, dec!(1)).await.unwrap();
        store.delete_wallet(b).await.unwrap();

        assert_eq!(unit.commit().await.unwrap_err(), LedgerError::WalletNotFound(b));
        assert_eq!(store.get_wallet(a).await.unwrap().balance, dec!(10));
        assert!(store.all_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_sorts_and_paginates() {
        let store = InMemoryLedgerStore::new();
        let a = store.create_wallet(&WalletDraft::new("a", dec!(0))).await.unwrap();
        let other = store.create_wallet(&WalletDraft::new("x", dec!(0))).await.unwrap();

        for (wallet, amount) in [(a, dec!(30)), (other, dec!(99)), (a, dec!(10)), (a, dec!(20))] {
            let mut unit = store.begin().await.unwrap();
            unit.record_transaction(&record(IdempotencyKey::generate(), wallet, amount))
                .await
                .unwrap();
            unit.adjust_balance(wallet, amount).await.unwrap();
            unit.commit().await.unwrap();
        }

        let amounts = |records: Vec<LedgerRecord>| records.into_iter().map(|r| r.amount).collect::<Vec<_>>();

        let by_date = store.list_transactions(a, &TransactionQuery::default()).await.unwrap();
        assert_eq!(amounts(by_date), vec![dec!(30), dec!(10), dec!(20)]);

        let by_amount_desc = TransactionQuery::new(Some(SortKey::Amount), Some(SortOrder::Desc), None, None);
        assert_eq!(
            amounts(store.list_transactions(a, &by_amount_desc).await.unwrap()),
            vec![dec!(30), dec!(20), dec!(10)]
        );

        let page = TransactionQuery::new(Some(SortKey::Amount), None, Some(1), Some(1));
        assert_eq!(amounts(store.list_transactions(a, &page).await.unwrap()), vec![dec!(20)]);

        assert_eq!(
            store
                .list_transactions(WalletId::new(404), &TransactionQuery::default())
                .await
                .unwrap_err(),
            LedgerError::WalletNotFound(WalletId::new(404))
        );
    }
}
