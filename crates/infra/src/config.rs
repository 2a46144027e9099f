//! Process configuration read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:3000` |
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `DATABASE_URL` | required when persistent |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `XR_HOST` | unset → fixed in-process rates |
//! | `XR_API_KEY` | empty |
//! | `XR_BASE_CURRENCY` | `rub` |

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_BASE_CURRENCY: &str = "rub";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required when {reason}")]
    Missing { name: &'static str, reason: &'static str },

    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// Where currency conversion comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeConfig {
    /// Built-in table; only the base currency converts.
    Fixed { base: String },
    Http {
        endpoint: String,
        api_key: String,
        base: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageBackend,
    pub exchange: ExchangeConfig,
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.trim().parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: format!("{e}"),
        })?;

        let persistent = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| ConfigError::Invalid {
                name: "USE_PERSISTENT_STORES",
                value: raw.clone(),
                reason: format!("{e}"),
            })?,
        };

        let storage = if persistent {
            let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing {
                name: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES=true",
            })?;
            let max_connections = match get("DB_MAX_CONNECTIONS") {
                None => DEFAULT_MAX_CONNECTIONS,
                Some(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ConfigError::Invalid {
                        name: "DB_MAX_CONNECTIONS",
                        value: raw.clone(),
                        reason: "expected a positive integer".to_string(),
                    })?,
            };
            StorageBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageBackend::InMemory
        };

        let base = get("XR_BASE_CURRENCY")
            .map(|b| b.trim().to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string());
        if !base.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid {
                name: "XR_BASE_CURRENCY",
                value: base,
                reason: "expected an alphabetic currency code".to_string(),
            });
        }

        let exchange = match get("XR_HOST") {
            Some(endpoint) => ExchangeConfig::Http {
                endpoint: endpoint.trim().to_string(),
                api_key: lookup("XR_API_KEY").unwrap_or_default(),
                base,
            },
            None => ExchangeConfig::Fixed { base },
        };

        Ok(Self {
            bind_addr,
            storage,
            exchange,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<LedgerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_in_memory_dev_setup() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.storage, StorageBackend::InMemory);
        assert_eq!(cfg.exchange, ExchangeConfig::Fixed { base: "rub".into() });
    }

    #[test]
    fn persistent_requires_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing {
                name: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES=true",
            }
        );

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/ewallet"),
            ("DB_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(
            cfg.storage,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/ewallet".into(),
                max_connections: 4,
            }
        );
    }

    #[test]
    fn exchange_endpoint_switches_to_http() {
        let cfg = config(&[
            ("XR_HOST", "https://rates.example/convert"),
            ("XR_API_KEY", "secret"),
            ("XR_BASE_CURRENCY", "EUR"),
        ])
        .unwrap();
        assert_eq!(
            cfg.exchange,
            ExchangeConfig::Http {
                endpoint: "https://rates.example/convert".into(),
                api_key: "secret".into(),
                base: "eur".into(),
            }
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config(&[("BIND_ADDR", "nope")]),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            config(&[("USE_PERSISTENT_STORES", "yes")]),
            Err(ConfigError::Invalid { name: "USE_PERSISTENT_STORES", .. })
        ));
        assert!(matches!(
            config(&[
                ("USE_PERSISTENT_STORES", "true"),
                ("DATABASE_URL", "postgres://x"),
                ("DB_MAX_CONNECTIONS", "0"),
            ]),
            Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. })
        ));
    }
}
