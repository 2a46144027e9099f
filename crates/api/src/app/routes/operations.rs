//! Balance-mutating endpoints. Each call is one atomic unit in the ledger;
//! the `uuid` in the body is the idempotency key.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use ewallet_core::{Amount, IdempotencyKey, LedgerError, WalletId};
use ewallet_infra::WalletService;

use crate::app::routes::common::{bad_body, parse_wallet_id};
use crate::app::{dto, errors};

struct Parsed {
    wallet: WalletId,
    amount: Amount,
    key: IdempotencyKey,
    target: Option<i64>,
}

fn parse(
    id: &str,
    body: Result<Json<dto::FinRequest>, JsonRejection>,
) -> Result<Parsed, axum::response::Response> {
    let wallet = parse_wallet_id(id)?;
    let Json(body) = body.map_err(bad_body)?;
    let key = body.key().map_err(errors::ledger_error_to_response)?;
    let amount = body.amount().map_err(errors::ledger_error_to_response)?;
    Ok(Parsed {
        wallet,
        amount,
        key,
        target: body.wallet_target,
    })
}

fn ok() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

pub async fn deposit(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    body: Result<Json<dto::FinRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match parse(&id, body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match wallets.deposit(req.wallet, req.amount, req.key).await {
        Ok(()) => ok(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    body: Result<Json<dto::FinRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match parse(&id, body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match wallets.withdraw(req.wallet, req.amount, req.key).await {
        Ok(()) => ok(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    body: Result<Json<dto::FinRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match parse(&id, body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let Some(target) = req.target else {
        return errors::ledger_error_to_response(LedgerError::validation(
            "walletTarget is required for transfers",
        ));
    };

    match wallets
        .transfer(req.wallet, WalletId::new(target), req.amount, req.key)
        .await
    {
        Ok(()) => ok(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
