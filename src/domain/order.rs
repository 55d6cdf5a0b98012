//! Normalized order records produced by invoice extraction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One purchased product entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub price: f64,
}

/// One charge to a specific payment instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub instrument_type: String,
    pub last_four: String,
    pub amount: f64,
}

/// A single invoice, normalized.
///
/// `total` is always derived by [`compute_total`] from the transactions or the
/// grand-total row; records are never patched field by field after creation.
///
/// [`compute_total`]: crate::domain::total::compute_total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    pub transactions: Vec<Transaction>,
    pub total: f64,
}

impl OrderRecord {
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|i| i.price).sum()
    }

    /// True when `other` carries the same content; the order id is not compared.
    pub fn same_content(&self, other: &OrderRecord) -> bool {
        self.order_date == other.order_date
            && self.items == other.items
            && self.transactions == other.transactions
            && self.total == other.total
    }
}

/// An order as persisted for one owner, with bookkeeping stamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub owner: String,
    pub record: OrderRecord,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
