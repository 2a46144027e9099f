use std::sync::Arc;

use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;

use ewallet_infra::{
    CurrencyConverter, ExchangeConfig, FixedRates, HttpExchangeRate, InMemoryLedgerStore,
    LedgerConfig, LedgerStore, PostgresLedgerStore, StorageBackend, WalletService,
};

/// Process context built once at startup and shared by every handler.
#[derive(Clone)]
pub struct AppContext {
    wallets: Arc<WalletService>,
}

impl AppContext {
    pub fn new(store: Arc<dyn LedgerStore>, exchange: Arc<dyn CurrencyConverter>) -> Self {
        Self {
            wallets: Arc::new(WalletService::new(store, exchange)),
        }
    }

    /// In-memory store with the given converter (dev/tests).
    pub fn in_memory(exchange: Arc<dyn CurrencyConverter>) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), exchange)
    }

    pub async fn from_config(config: &LedgerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn LedgerStore> = match &config.storage {
            StorageBackend::InMemory => {
                tracing::warn!("USE_PERSISTENT_STORES is off; balances live in memory only");
                Arc::new(InMemoryLedgerStore::new())
            }
            StorageBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await
                    .context("failed to connect to Postgres")?;
                let store = PostgresLedgerStore::new(pool);
                store
                    .ensure_schema()
                    .await
                    .context("failed to create ledger schema")?;
                Arc::new(store)
            }
        };

        let exchange: Arc<dyn CurrencyConverter> = match &config.exchange {
            ExchangeConfig::Fixed { base } => {
                tracing::warn!(base = %base, "XR_HOST not set; only the base currency converts");
                Arc::new(FixedRates::new(base.clone()))
            }
            ExchangeConfig::Http {
                endpoint,
                api_key,
                base,
            } => Arc::new(HttpExchangeRate::new(endpoint.clone(), api_key.clone(), base.clone())),
        };

        Ok(Self::new(store, exchange))
    }

    pub fn wallets(&self) -> Arc<WalletService> {
        Arc::clone(&self.wallets)
    }
}
