use rust_decimal::Decimal;
use serde::Deserialize;

use ewallet_core::{
    Amount, IdempotencyKey, LedgerRecord, LedgerResult, SortKey, SortOrder, TransactionQuery,
    Wallet, WalletDraft, WalletId,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub owner: String,
    #[serde(default)]
    pub balance: Decimal,
}

impl From<WalletRequest> for WalletDraft {
    fn from(req: WalletRequest) -> Self {
        WalletDraft::new(req.owner, req.balance)
    }
}

/// Body of deposit, withdraw and transfer.
#[derive(Debug, Deserialize)]
pub struct FinRequest {
    pub sum: Decimal,
    #[serde(rename = "walletTarget")]
    pub wallet_target: Option<i64>,
    pub uuid: String,
}

impl FinRequest {
    pub fn amount(&self) -> LedgerResult<Amount> {
        Amount::new(self.sum)
    }

    pub fn key(&self) -> LedgerResult<IdempotencyKey> {
        self.uuid.parse()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    pub currency: Option<String>,
}

/// Raw history query parameters; parsed by [`TransactionParams::to_query`].
#[derive(Debug, Default, Deserialize)]
pub struct TransactionParams {
    pub sort: Option<String>,
    pub desc: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl TransactionParams {
    pub fn to_query(&self) -> LedgerResult<TransactionQuery> {
        let sort = self.sort.as_deref().map(str::parse::<SortKey>).transpose()?;
        let order = parse_opt::<bool>("desc", &self.desc)?.map(SortOrder::from_desc);
        let limit = parse_opt::<u32>("limit", &self.limit)?;
        let offset = parse_opt::<u32>("offset", &self.offset)?;
        Ok(TransactionQuery::new(sort, order, limit, offset))
    }
}

fn parse_opt<T: core::str::FromStr>(name: &str, raw: &Option<String>) -> LedgerResult<Option<T>>
where
    T::Err: core::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|e| {
            ewallet_core::LedgerError::validation(format!("{name}: {e}"))
        }),
    }
}

// -------------------------
// JSON mapping
// -------------------------

pub fn wallet_to_json(w: Wallet) -> serde_json::Value {
    serde_json::json!({
        "id": w.id,
        "owner": w.owner,
        "balance": w.balance,
        "created_at": w.created_at,
        "updated_at": w.updated_at,
        "frozen": w.frozen,
    })
}

pub fn record_to_json(r: LedgerRecord) -> serde_json::Value {
    serde_json::json!({
        "transaction_id": r.id,
        "uuid": r.key,
        "from_id": r.from_id,
        "to_id": r.to_id,
        "sum": r.amount,
        "operation": r.operation,
        "date": r.date,
    })
}

pub fn wallet_id_to_json(id: WalletId) -> serde_json::Value {
    serde_json::json!({ "id": id })
}
