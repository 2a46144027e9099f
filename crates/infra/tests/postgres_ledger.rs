//! Postgres store tests. Skipped unless `TEST_DATABASE_URL` points at a
//! disposable database.

use std::sync::Arc;

use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;

use ewallet_core::{
    Amount, IdempotencyKey, LedgerError, SortKey, SortOrder, TransactionQuery, WalletDraft,
    WalletId,
};
use ewallet_infra::ledger_store::{LedgerStore, PostgresLedgerStore};
use ewallet_infra::mutation::MutationProtocol;

async fn store() -> Option<Arc<PostgresLedgerStore>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    let store = PostgresLedgerStore::new(pool);
    store.ensure_schema().await.expect("ensure schema");
    // Twice: the bootstrap script must be idempotent.
    store.ensure_schema().await.expect("ensure schema again");
    Some(Arc::new(store))
}

fn amount(value: rust_decimal::Decimal) -> Amount {
    Amount::new(value).unwrap()
}

#[tokio::test]
async fn wallet_lifecycle() {
    let Some(store) = store().await else { return };

    let id = store
        .create_wallet(&WalletDraft::new("pg-alice", dec!(10.25)))
        .await
        .unwrap();
    let wallet = store.get_wallet(id).await.unwrap();
    assert_eq!(wallet.owner, "pg-alice");
    assert_eq!(wallet.balance, dec!(10.25));
    assert!(!wallet.frozen);

    let updated = store
        .update_wallet(id, &WalletDraft::new("pg-bob", dec!(3)))
        .await
        .unwrap();
    assert_eq!(updated.owner, "pg-bob");
    assert_eq!(updated.balance, dec!(3));

    store.freeze(id).await.unwrap();
    assert!(store.get_wallet(id).await.unwrap().frozen);
    store.unfreeze(id).await.unwrap();

    store.delete_wallet(id).await.unwrap();
    assert_eq!(store.get_wallet(id).await.unwrap_err(), LedgerError::WalletNotFound(id));
    assert_eq!(store.freeze(id).await.unwrap_err(), LedgerError::WalletNotFound(id));
}

#[tokio::test]
async fn mutation_scenarios_against_postgres() {
    let Some(store) = store().await else { return };
    let protocol = MutationProtocol::new(store.clone());

    let a = store.create_wallet(&WalletDraft::new("pg-a", dec!(1000))).await.unwrap();
    let b = store.create_wallet(&WalletDraft::new("pg-b", dec!(1000))).await.unwrap();
    let key = IdempotencyKey::generate();

    protocol.deposit(a, amount(dec!(1000)), key).await.unwrap();
    assert_eq!(
        protocol.deposit(a, amount(dec!(1000)), key).await.unwrap_err(),
        LedgerError::DuplicateKey(key)
    );
    assert!(matches!(
        protocol
            .withdraw(a, amount(dec!(5000)), IdempotencyKey::generate())
            .await
            .unwrap_err(),
        LedgerError::InsufficientFunds { .. }
    ));
    protocol
        .transfer(a, b, amount(dec!(600)), IdempotencyKey::generate())
        .await
        .unwrap();

    assert_eq!(store.get_wallet(a).await.unwrap().balance, dec!(1400));
    assert_eq!(store.get_wallet(b).await.unwrap().balance, dec!(1600));

    let ghost = WalletId::new(i64::MAX);
    assert_eq!(
        protocol
            .transfer(a, ghost, amount(dec!(1)), IdempotencyKey::generate())
            .await
            .unwrap_err(),
        LedgerError::TargetWalletNotFound(ghost)
    );
    assert_eq!(store.get_wallet(a).await.unwrap().balance, dec!(1400));

    let query = TransactionQuery::new(Some(SortKey::Amount), Some(SortOrder::Desc), None, None);
    let history = store.list_transactions(a, &query).await.unwrap();
    let amounts: Vec<_> = history.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![dec!(1000), dec!(600)]);
    assert_eq!(history[1].to_id, Some(b));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_full_withdrawals_serialize_on_row_lock() {
    let Some(store) = store().await else { return };
    let protocol = MutationProtocol::new(store.clone());
    let w = store.create_wallet(&WalletDraft::new("pg-race", dec!(300))).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let protocol = protocol.clone();
        handles.push(tokio::spawn(async move {
            protocol
                .withdraw(w, amount(dec!(300)), IdempotencyKey::generate())
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(err) => assert!(matches!(err, LedgerError::InsufficientFunds { .. })),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.get_wallet(w).await.unwrap().balance, dec!(0));
}
