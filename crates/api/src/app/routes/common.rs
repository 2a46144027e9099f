use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use ewallet_core::WalletId;

use crate::app::errors;

/// Parse a `:id` path segment.
pub fn parse_wallet_id(raw: &str) -> Result<WalletId, axum::response::Response> {
    raw.parse().map_err(errors::ledger_error_to_response)
}

/// Turn a body extraction failure into the JSON error contract.
pub fn bad_body(rejection: JsonRejection) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}
