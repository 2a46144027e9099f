use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{CurrencyConverter, ExchangeError};

/// Client for a `convert`-style exchange-rate HTTP API.
///
/// Issues `GET <endpoint>?to=<currency>&from=<base>&amount=<amount>` with an
/// `apikey` header and reads the `result` field of the JSON reply.
#[derive(Debug, Clone)]
pub struct HttpExchangeRate {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<Decimal>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpExchangeRate {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        base: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            base: base.into().to_ascii_lowercase(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl CurrencyConverter for HttpExchangeRate {
    #[instrument(skip(self), fields(base = %self.base), err)]
    async fn convert(&self, currency: &str, amount: Decimal) -> Result<Decimal, ExchangeError> {
        let amount_param = amount.normalize().to_string();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("to", currency),
                ("from", self.base.as_str()),
                ("amount", amount_param.as_str()),
            ])
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::Lookup(format!("exchange request failed: {e}")))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(ExchangeError::CurrencyNotFound(currency.to_string()));
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ExchangeError::Lookup(format!(
                    "unexpected status code: {} body: {}",
                    status.as_u16(),
                    body
                )));
            }
        }

        let body: ConvertResponse = resp
            .json()
            .await
            .map_err(|e| ExchangeError::Lookup(format!("err decoding response: {e}")))?;
        debug!(success = ?body.success, "exchange response decoded");

        if body.success == Some(false) {
            let detail = body
                .error
                .map(|e| {
                    let code = e.code.map(|c| c.to_string()).unwrap_or_default();
                    format!("{code} {}", e.message.unwrap_or_default())
                })
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(ExchangeError::Lookup(format!(
                "exchange rejected the request: {}",
                detail.trim()
            )));
        }

        body.result
            .ok_or_else(|| ExchangeError::Lookup("response has no result".to_string()))
    }
}
