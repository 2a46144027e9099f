//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateKey` | Idempotency key reused (unique index on `transactions.uuid`) |
//! | Database (check constraint violation) | `23514` | `Storage` | Non-positive sum or unknown operation reached the table |
//! | Database (deadlock / serialization failure) | `40P01`, `40001` | `Storage` | Unit aborted by Postgres; nothing applied, retry with the same key |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! Missing rows are detected from empty result sets or zero affected rows and
//! reported as `WalletNotFound`, never through `sqlx::Error::RowNotFound`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, instrument};
use uuid::Uuid;

use async_trait::async_trait;
use ewallet_core::{
    IdempotencyKey, LedgerError, LedgerRecord, LedgerResult, NewLedgerRecord, SortKey, SortOrder,
    TransactionId, TransactionQuery, Wallet, WalletDraft, WalletId,
};

use super::r#trait::{AtomicUnit, LedgerStore};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed wallet and ledger store.
///
/// Atomic units are database transactions; `lock_wallet_for_update` is a
/// `SELECT ... FOR UPDATE`, so concurrent debits of one wallet serialize on
/// the row while unrelated wallets proceed in parallel.
///
/// Only the source row is locked explicitly. The target `UPDATE` takes the
/// target's row lock implicitly, so opposing transfers (A→B and B→A) can
/// deadlock; Postgres aborts one of them with `40P01`, which surfaces as a
/// `Storage` error with the unit rolled back.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `wallets` and `transactions` tables if missing.
    ///
    /// Idempotent; safe to call on every startup.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> LedgerResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn set_frozen(&self, id: WalletId, frozen: bool) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET frozen = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(frozen)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_frozen", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self, draft),
        fields(owner = %draft.owner, wallet_id = tracing::field::Empty),
        err
    )]
    async fn create_wallet(&self, draft: &WalletDraft) -> LedgerResult<WalletId> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (owner, balance)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&draft.owner)
        .bind(draft.balance)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_wallet", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| LedgerError::storage(format!("failed to read wallet id: {e}")))?;
        Span::current().record("wallet_id", id);
        Ok(WalletId::new(id))
    }

    #[instrument(skip(self), fields(wallet_id = %id), err)]
    async fn get_wallet(&self, id: WalletId) -> LedgerResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, balance, created_at, updated_at, frozen
            FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_wallet", e))?
        .ok_or(LedgerError::WalletNotFound(id))?;

        Ok(WalletRow::from_row(&row)
            .map_err(|e| LedgerError::storage(format!("failed to deserialize wallet row: {e}")))?
            .into())
    }

    #[instrument(skip(self, draft), fields(wallet_id = %id), err)]
    async fn update_wallet(&self, id: WalletId, draft: &WalletDraft) -> LedgerResult<Wallet> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET owner = $2, balance = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner, balance, created_at, updated_at, frozen
            "#,
        )
        .bind(id.get())
        .bind(&draft.owner)
        .bind(draft.balance)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_wallet", e))?
        .ok_or(LedgerError::WalletNotFound(id))?;

        Ok(WalletRow::from_row(&row)
            .map_err(|e| LedgerError::storage(format!("failed to deserialize wallet row: {e}")))?
            .into())
    }

    #[instrument(skip(self), fields(wallet_id = %id), err)]
    async fn delete_wallet(&self, id: WalletId) -> LedgerResult<()> {
        let result = sqlx::query("DELETE FROM wallets WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_wallet", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(wallet_id = %id), err)]
    async fn freeze(&self, id: WalletId) -> LedgerResult<()> {
        self.set_frozen(id, true).await
    }

    #[instrument(skip(self), fields(wallet_id = %id), err)]
    async fn unfreeze(&self, id: WalletId) -> LedgerResult<()> {
        self.set_frozen(id, false).await
    }

    async fn begin<'a>(&'a self) -> LedgerResult<Box<dyn AtomicUnit + 'a>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnit { tx }))
    }

    #[instrument(
        skip(self),
        fields(
            wallet_id = %wallet,
            sort = ?query.sort,
            order = ?query.order,
            record_count = tracing::field::Empty
        ),
        err
    )]
    async fn list_transactions(
        &self,
        wallet: WalletId,
        query: &TransactionQuery,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        let exists = sqlx::query("SELECT 1 FROM wallets WHERE id = $1")
            .bind(wallet.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_transactions", e))?
            .is_some();
        if !exists {
            return Err(LedgerError::WalletNotFound(wallet));
        }

        let column = match query.sort {
            SortKey::Amount => "sum",
            SortKey::Date => "date",
        };
        let direction = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            r#"
            SELECT id, uuid, from_id, to_id, operation, sum, date
            FROM transactions
            WHERE from_id = $1 OR to_id = $1
            ORDER BY {column} {direction}, id {direction}
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(wallet.get())
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_transactions", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = LedgerRecordRow::from_row(&row).map_err(|e| {
                LedgerError::storage(format!("failed to deserialize transaction row: {e}"))
            })?;
            records.push(record.try_into()?);
        }

        Span::current().record("record_count", records.len());
        Ok(records)
    }
}

/// A database transaction. Dropping it without commit rolls it back.
struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AtomicUnit for PostgresUnit {
    async fn is_frozen(&mut self, wallet: WalletId) -> LedgerResult<bool> {
        let row = sqlx::query("SELECT frozen FROM wallets WHERE id = $1")
            .bind(wallet.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("is_frozen", e))?
            .ok_or(LedgerError::WalletNotFound(wallet))?;

        row.try_get("frozen")
            .map_err(|e| LedgerError::storage(format!("failed to read frozen flag: {e}")))
    }

    async fn lock_wallet_for_update(&mut self, wallet: WalletId) -> LedgerResult<Decimal> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE id = $1 FOR UPDATE")
            .bind(wallet.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_wallet_for_update", e))?
            .ok_or(LedgerError::WalletNotFound(wallet))?;

        row.try_get("balance")
            .map_err(|e| LedgerError::storage(format!("failed to read balance: {e}")))
    }

    async fn record_transaction(&mut self, record: &NewLedgerRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (uuid, from_id, to_id, operation, sum)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*record.key.as_uuid())
        .bind(record.from_id.get())
        .bind(record.to_id.map(|id| id.get()))
        .bind(record.operation.as_str())
        .bind(record.amount.value())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateKey(record.key)
            } else {
                map_sqlx_error("record_transaction", e)
            }
        })?;
        Ok(())
    }

    async fn adjust_balance(&mut self, wallet: WalletId, delta: Decimal) -> LedgerResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.get())
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_balance", e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[derive(Debug)]
struct WalletRow {
    id: i64,
    owner: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    frozen: bool,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for WalletRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(WalletRow {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            frozen: row.try_get("frozen")?,
        })
    }
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            id: WalletId::new(row.id),
            owner: row.owner,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
            frozen: row.frozen,
        }
    }
}

#[derive(Debug)]
struct LedgerRecordRow {
    id: i64,
    uuid: Uuid,
    from_id: i64,
    to_id: Option<i64>,
    operation: String,
    sum: Decimal,
    date: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for LedgerRecordRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerRecordRow {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            from_id: row.try_get("from_id")?,
            to_id: row.try_get("to_id")?,
            operation: row.try_get("operation")?,
            sum: row.try_get("sum")?,
            date: row.try_get("date")?,
        })
    }
}

impl TryFrom<LedgerRecordRow> for LedgerRecord {
    type Error = LedgerError;

    fn try_from(row: LedgerRecordRow) -> Result<Self, Self::Error> {
        let operation = row
            .operation
            .parse()
            .map_err(|e| LedgerError::storage(format!("corrupt transaction row {}: {e}", row.id)))?;
        Ok(LedgerRecord {
            id: TransactionId::new(row.id),
            key: IdempotencyKey::from_uuid(row.uuid),
            from_id: WalletId::new(row.from_id),
            to_id: row.to_id.map(WalletId::new),
            operation,
            amount: row.sum,
            date: row.date,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Deadlock detected / serialization failure: Postgres rolled the unit back.
fn is_retryable_conflict(code: &str) -> bool {
    matches!(code, "40P01" | "40001")
}

/// Map SQLx errors to LedgerError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) if is_retryable_conflict(&code) => LedgerError::storage(format!(
                "{} aborted by lock conflict ({}); retry with the same key",
                operation, code
            )),
            _ => LedgerError::storage(format!(
                "database error in {}: {}",
                operation,
                db_err.message()
            )),
        },
        sqlx::Error::PoolClosed => {
            LedgerError::storage(format!("connection pool closed in {}", operation))
        }
        _ => LedgerError::storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
