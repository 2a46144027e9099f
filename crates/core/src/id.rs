//! Strongly-typed identifiers used across the ledger.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Identifier of a wallet (assigned by the store on creation).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(i64);

/// Identifier of a ledger record (assigned by the store on insert).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| LedgerError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_int_newtype!(WalletId, "WalletId");
impl_int_newtype!(TransactionId, "TransactionId");

/// Caller-supplied idempotency key (a UUID), unique across all ledger records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    /// Fresh random key. Callers normally supply their own.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for IdempotencyKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s.trim())
            .map_err(|e| LedgerError::validation(format!("incorrect format of uuid: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_id_parses_integers_only() {
        assert_eq!("42".parse::<WalletId>().unwrap(), WalletId::new(42));
        assert!(matches!(
            "abc".parse::<WalletId>(),
            Err(LedgerError::Validation(msg)) if msg.starts_with("WalletId")
        ));
    }

    #[test]
    fn idempotency_key_rejects_non_uuid() {
        let key: IdempotencyKey = "6f1c1a4e-43f5-4d5e-9b0a-3f8f4f3bb0a1".parse().unwrap();
        assert_eq!(key.to_string(), "6f1c1a4e-43f5-4d5e-9b0a-3f8f4f3bb0a1");

        let err = "not-a-uuid".parse::<IdempotencyKey>().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
