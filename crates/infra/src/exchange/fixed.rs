use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{CurrencyConverter, ExchangeError};

/// In-process table of conversion factors (dev/tests).
///
/// The base currency itself always converts at factor one.
#[derive(Debug, Clone)]
pub struct FixedRates {
    base: String,
    factors: HashMap<String, Decimal>,
}

impl FixedRates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().to_ascii_lowercase(),
            factors: HashMap::new(),
        }
    }

    /// One unit of the base currency is worth `factor` units of `currency`.
    pub fn with_rate(mut self, currency: &str, factor: Decimal) -> Self {
        self.factors.insert(currency.to_ascii_lowercase(), factor);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl CurrencyConverter for FixedRates {
    async fn convert(&self, currency: &str, amount: Decimal) -> Result<Decimal, ExchangeError> {
        let currency = currency.to_ascii_lowercase();
        if currency == self.base {
            return Ok(amount);
        }
        let factor = match self.factors.get(&currency) {
            Some(factor) => *factor,
            None => return Err(ExchangeError::CurrencyNotFound(currency)),
        };
        amount.checked_mul(factor).ok_or_else(|| {
            ExchangeError::Lookup(format!("{amount} in {currency} is out of range"))
        })
    }
}
