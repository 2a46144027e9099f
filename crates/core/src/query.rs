//! Transaction history query parameters (sort, order, pagination).

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Column the history is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Amount,
    #[default]
    Date,
}

impl FromStr for SortKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // "sum" is the stored column name and an accepted alias.
            "amount" | "sum" => Ok(SortKey::Amount),
            "date" | "" => Ok(SortKey::Date),
            other => Err(LedgerError::validation(format!(
                "sort must be one of: amount, date (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_desc(desc: bool) -> Self {
        if desc { SortOrder::Desc } else { SortOrder::Asc }
    }
}

/// Parameters of `list_transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

impl TransactionQuery {
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Build from optional parts. A missing or zero limit means the default.
    pub fn new(
        sort: Option<SortKey>,
        order: Option<SortOrder>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Self {
        Self {
            sort: sort.unwrap_or_default(),
            order: order.unwrap_or_default(),
            limit: limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_date_ascending_first_hundred() {
        let q = TransactionQuery::default();
        assert_eq!(q.sort, SortKey::Date);
        assert_eq!(q.order, SortOrder::Asc);
        assert_eq!(q.limit, 100);
        assert_eq!(q.offset, 0);

        assert_eq!(TransactionQuery::new(None, None, Some(0), None).limit, 100);
        assert_eq!(TransactionQuery::new(None, None, Some(5), Some(10)).limit, 5);
    }

    #[test]
    fn sort_key_accepts_sum_alias_and_rejects_unknown() {
        assert_eq!("sum".parse::<SortKey>().unwrap(), SortKey::Amount);
        assert_eq!("Amount".parse::<SortKey>().unwrap(), SortKey::Amount);
        assert_eq!("date".parse::<SortKey>().unwrap(), SortKey::Date);
        assert!("owner".parse::<SortKey>().is_err());
        assert_eq!(SortOrder::from_desc(true), SortOrder::Desc);
    }
}
