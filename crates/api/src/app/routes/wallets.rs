use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use ewallet_infra::WalletService;

use crate::app::routes::common::{bad_body, parse_wallet_id};
use crate::app::{dto, errors};

pub async fn create_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    body: Result<Json<dto::WalletRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body(rejection),
    };

    match wallets.create_wallet(&body.into()).await {
        Ok(id) => (StatusCode::CREATED, Json(dto::wallet_id_to_json(id))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    Query(query): Query<dto::WalletQuery>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let currency = query.currency.as_deref().filter(|c| !c.trim().is_empty());

    match wallets.get_wallet(id, currency).await {
        Ok(w) => (StatusCode::OK, Json(dto::wallet_to_json(w))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    body: Result<Json<dto::WalletRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_body(rejection),
    };

    match wallets.update_wallet(id, &body.into()).await {
        Ok(w) => (StatusCode::OK, Json(dto::wallet_to_json(w))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match wallets.delete_wallet(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn freeze_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match wallets.freeze(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn unfreeze_wallet(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match wallets.unfreeze(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(id): Path<String>,
    Query(params): Query<dto::TransactionParams>,
) -> axum::response::Response {
    let id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let query = match params.to_query() {
        Ok(q) => q,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match wallets.transactions(id, &query).await {
        Ok(records) => {
            let items = records.into_iter().map(dto::record_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
