use axum::{
    Router,
    routing::{get, post, put},
};

pub mod common;
pub mod operations;
pub mod system;
pub mod wallets;

/// Router for every endpoint under `/api/v1`.
pub fn router() -> Router {
    Router::new()
        .route("/wallet", post(wallets::create_wallet))
        .route(
            "/wallet/:id",
            get(wallets::get_wallet)
                .put(wallets::update_wallet)
                .delete(wallets::delete_wallet),
        )
        .route("/wallet/:id/freeze", put(wallets::freeze_wallet))
        .route("/wallet/:id/unfreeze", put(wallets::unfreeze_wallet))
        .route("/wallet/:id/transactions", get(wallets::list_transactions))
        .route("/wallet/:id/deposit", put(operations::deposit))
        .route("/wallet/:id/withdraw", put(operations::withdraw))
        .route("/wallet/:id/transfer", put(operations::transfer))
        .route("/rate/:currency", get(system::rate))
}
