use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use ewallet_core::LedgerError;

/// Map a ledger error onto the HTTP error contract.
///
/// Not found → 404, duplicate key → 409, insufficient funds and validation
/// → 400, everything else → 500. Server errors are logged.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        LedgerError::WalletNotFound(_) | LedgerError::TargetWalletNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        LedgerError::DuplicateKey(_) => json_error(StatusCode::CONFLICT, "duplicate_key", message),
        LedgerError::InsufficientFunds { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_funds", message)
        }
        LedgerError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        LedgerError::WalletFrozen(_) => server_error("wallet_frozen", message),
        LedgerError::CurrencyNotFound(_) => server_error("currency_not_found", message),
        LedgerError::Exchange(_) => server_error("exchange_error", message),
        LedgerError::Storage(_) => server_error("storage_error", message),
    }
}

fn server_error(code: &'static str, message: String) -> axum::response::Response {
    tracing::error!(error = code, %message, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
