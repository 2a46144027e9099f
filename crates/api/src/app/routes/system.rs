use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use ewallet_infra::WalletService;

use crate::app::errors;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// `GET /rate/:currency`: value of one base-currency unit in `currency`.
pub async fn rate(
    Extension(wallets): Extension<Arc<WalletService>>,
    Path(currency): Path<String>,
) -> axum::response::Response {
    match wallets.rate(&currency).await {
        Ok(rate) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "currency": currency.to_ascii_lowercase(),
                "rate": rate,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
