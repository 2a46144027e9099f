//! Currency conversion collaborators (read path only).
//!
//! Balances are stored in one base currency; a converter turns an amount of
//! the base currency into another currency. Conversion never touches storage.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use ewallet_core::LedgerError;

pub mod fixed;
pub mod http;

pub use fixed::FixedRates;
pub use http::HttpExchangeRate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("{0}")]
    CurrencyNotFound(String),

    /// Transport failure, unexpected status or undecodable response.
    #[error("{0}")]
    Lookup(String),
}

impl From<ExchangeError> for LedgerError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::CurrencyNotFound(code) => LedgerError::CurrencyNotFound(code),
            ExchangeError::Lookup(msg) => LedgerError::Exchange(msg),
        }
    }
}

/// Converts amounts of the base currency into other currencies.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// `amount` of the base currency expressed in `currency`.
    async fn convert(&self, currency: &str, amount: Decimal) -> Result<Decimal, ExchangeError>;
}

/// Currency codes are non-empty ASCII letters; matching is case-insensitive.
pub fn normalize_currency(code: &str) -> Result<String, LedgerError> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::validation(format!(
            "currency must be alphabetic (got '{code}')"
        )));
    }
    Ok(code.to_ascii_lowercase())
}
