//! Flat-file order store: one CSV holding orders, items and transactions.
//!
//! Each row is tagged by `kind`. Child rows follow their order row and carry
//! its id. The whole file is rewritten on every mutation through a temporary
//! file in the same directory, so a failed write leaves the previous contents
//! in place.

use crate::domain::error::LedgerError;
use crate::domain::order::{LineItem, OrderRecord, StoredOrder, Transaction};
use crate::domain::reconciler::{KnownOrderIndex, ReconcilePlan};
use crate::ports::order_store_port::OrderStorePort;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RowKind {
    Order,
    Item,
    Transaction,
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    kind: RowKind,
    order_id: String,
    owner: Option<String>,
    order_date: Option<NaiveDate>,
    total: Option<f64>,
    name: Option<String>,
    price: Option<f64>,
    instrument_type: Option<String>,
    last_four: Option<String>,
    amount: Option<f64>,
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
}

impl CsvRow {
    fn blank(kind: RowKind, order_id: &str) -> Self {
        Self {
            kind,
            order_id: order_id.to_string(),
            owner: None,
            order_date: None,
            total: None,
            name: None,
            price: None,
            instrument_type: None,
            last_four: None,
            amount: None,
            created: None,
            updated: None,
        }
    }
}

fn csv_error(e: csv::Error) -> LedgerError {
    LedgerError::Database {
        reason: format!("CSV parse error: {}", e),
    }
}

fn malformed(order_id: &str, what: &str) -> LedgerError {
    LedgerError::Database {
        reason: format!("order {}: {}", order_id, what),
    }
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty store file unless one exists.
    pub fn initialize(&self) -> Result<(), LedgerError> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&[])
    }

    /// All stored orders in file order. A missing file is an empty store.
    fn load(&self) -> Result<Vec<StoredOrder>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path).map_err(csv_error)?;
        let mut orders: Vec<StoredOrder> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for result in rdr.deserialize::<CsvRow>() {
            let row = result.map_err(csv_error)?;
            if row.kind == RowKind::Order {
                let owner = row
                    .owner
                    .ok_or_else(|| malformed(&row.order_id, "missing owner"))?;
                let total = row
                    .total
                    .ok_or_else(|| malformed(&row.order_id, "missing total"))?;
                let created = row
                    .created
                    .ok_or_else(|| malformed(&row.order_id, "missing created"))?;
                positions.insert(row.order_id.clone(), orders.len());
                orders.push(StoredOrder {
                    owner,
                    record: OrderRecord {
                        order_id: row.order_id,
                        order_date: row.order_date,
                        items: Vec::new(),
                        transactions: Vec::new(),
                        total,
                    },
                    created,
                    updated: row.updated.unwrap_or(created),
                });
                continue;
            }

            let pos = *positions
                .get(&row.order_id)
                .ok_or_else(|| malformed(&row.order_id, "child row before its order"))?;
            let record = &mut orders[pos].record;
            match row.kind {
                RowKind::Item => record.items.push(LineItem {
                    name: row.name.unwrap_or_default(),
                    price: row.price.unwrap_or(0.0),
                }),
                RowKind::Transaction => record.transactions.push(Transaction {
                    instrument_type: row.instrument_type.unwrap_or_default(),
                    last_four: row.last_four.unwrap_or_default(),
                    amount: row.amount.unwrap_or(0.0),
                }),
                RowKind::Order => {}
            }
        }
        Ok(orders)
    }

    fn save(&self, orders: &[StoredOrder]) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut wtr = csv::Writer::from_writer(tmp.as_file_mut());
            for stored in orders {
                let record = &stored.record;
                let mut row = CsvRow::blank(RowKind::Order, &record.order_id);
                row.owner = Some(stored.owner.clone());
                row.order_date = record.order_date;
                row.total = Some(record.total);
                row.created = Some(stored.created);
                row.updated = Some(stored.updated);
                wtr.serialize(row).map_err(csv_error)?;

                for item in &record.items {
                    let mut row = CsvRow::blank(RowKind::Item, &record.order_id);
                    row.name = Some(item.name.clone());
                    row.price = Some(item.price);
                    wtr.serialize(row).map_err(csv_error)?;
                }
                for tx in &record.transactions {
                    let mut row = CsvRow::blank(RowKind::Transaction, &record.order_id);
                    row.instrument_type = Some(tx.instrument_type.clone());
                    row.last_four = Some(tx.last_four.clone());
                    row.amount = Some(tx.amount);
                    wtr.serialize(row).map_err(csv_error)?;
                }
            }
            wtr.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| LedgerError::Io(e.error))?;
        debug!("wrote {} orders to {}", orders.len(), self.path.display());
        Ok(())
    }

    fn insert_into(
        orders: &mut Vec<StoredOrder>,
        owner: &str,
        record: &OrderRecord,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if orders.iter().any(|o| o.record.order_id == record.order_id) {
            return Err(LedgerError::DatabaseQuery {
                reason: format!("order {} already exists", record.order_id),
            });
        }
        orders.push(StoredOrder {
            owner: owner.to_string(),
            record: record.clone(),
            created: now,
            updated: now,
        });
        Ok(())
    }

    fn replace_in(
        orders: &mut [StoredOrder],
        owner: &str,
        record: &OrderRecord,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let stored = orders
            .iter_mut()
            .find(|o| o.owner == owner && o.record.order_id == record.order_id)
            .ok_or_else(|| LedgerError::DatabaseQuery {
                reason: format!("order {} does not exist for {}", record.order_id, owner),
            })?;
        stored.record = record.clone();
        stored.updated = now;
        Ok(())
    }

    /// Newest first: by created stamp, then by position in the file.
    fn newest_first(orders: Vec<StoredOrder>) -> Vec<StoredOrder> {
        let mut orders: Vec<StoredOrder> = orders.into_iter().rev().collect();
        orders.sort_by(|a, b| b.created.cmp(&a.created));
        orders
    }
}

impl OrderStorePort for CsvAdapter {
    fn known_orders(&self, owner: &str, limit: usize) -> Result<KnownOrderIndex, LedgerError> {
        let records = Self::newest_first(self.load()?)
            .into_iter()
            .filter(|o| o.owner == owner)
            .take(limit)
            .map(|o| o.record);
        Ok(KnownOrderIndex::from_records(owner, records))
    }

    fn stored_orders(
        &self,
        owner: &str,
        order_ids: &[String],
    ) -> Result<Vec<OrderRecord>, LedgerError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|o| o.owner == owner && order_ids.contains(&o.record.order_id))
            .map(|o| o.record)
            .collect())
    }

    fn insert_orders(&self, owner: &str, orders: &[OrderRecord]) -> Result<(), LedgerError> {
        let mut stored = self.load()?;
        let now = Utc::now();
        for order in orders {
            Self::insert_into(&mut stored, owner, order, now)?;
        }
        self.save(&stored)
    }

    fn update_order(&self, owner: &str, order: &OrderRecord) -> Result<(), LedgerError> {
        let mut stored = self.load()?;
        Self::replace_in(&mut stored, owner, order, Utc::now())?;
        self.save(&stored)
    }

    fn apply_plan(&self, owner: &str, plan: &ReconcilePlan) -> Result<(), LedgerError> {
        let mut stored = self.load()?;
        let now = Utc::now();
        for order in &plan.to_create {
            Self::insert_into(&mut stored, owner, order, now)?;
        }
        for order in &plan.to_update {
            Self::replace_in(&mut stored, owner, order, now)?;
        }
        self.save(&stored)
    }

    fn recent_orders(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredOrder>, LedgerError> {
        Ok(Self::newest_first(self.load()?)
            .into_iter()
            .filter(|o| owner.is_none_or(|w| o.owner == w))
            .take(limit)
            .collect())
    }
}
