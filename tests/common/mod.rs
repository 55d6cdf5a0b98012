#![allow(dead_code)]

use order_ledger::domain::error::LedgerError;
use order_ledger::domain::order::{OrderRecord, StoredOrder};
use order_ledger::domain::reconciler::{KnownOrderIndex, ReconcilePlan};
use order_ledger::ports::order_store_port::OrderStorePort;
use chrono::{TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

/// In-memory order store. Each write bumps a logical clock so creation
/// order stays observable.
pub struct MockOrderStore {
    pub orders: RefCell<Vec<StoredOrder>>,
    pub fail_writes: Option<String>,
    pub apply_calls: Cell<usize>,
    clock: Cell<i64>,
}

impl MockOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RefCell::new(Vec::new()),
            fail_writes: None,
            apply_calls: Cell::new(0),
            clock: Cell::new(0),
        }
    }

    pub fn with_orders(self, owner: &str, records: Vec<OrderRecord>) -> Self {
        self.insert_orders(owner, &records).unwrap();
        self
    }

    pub fn with_write_error(mut self, reason: &str) -> Self {
        self.fail_writes = Some(reason.to_string());
        self
    }

    pub fn record(&self, order_id: &str) -> Option<OrderRecord> {
        self.orders
            .borrow()
            .iter()
            .find(|o| o.record.order_id == order_id)
            .map(|o| o.record.clone())
    }

    pub fn len(&self) -> usize {
        self.orders.borrow().len()
    }

    fn tick(&self) -> chrono::DateTime<Utc> {
        let t = self.clock.get() + 1;
        self.clock.set(t);
        Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap()
    }

    fn check_writable(&self) -> Result<(), LedgerError> {
        match &self.fail_writes {
            Some(reason) => Err(LedgerError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl OrderStorePort for MockOrderStore {
    fn known_orders(&self, owner: &str, limit: usize) -> Result<KnownOrderIndex, LedgerError> {
        let orders = self.recent_orders(Some(owner), limit)?;
        Ok(KnownOrderIndex::from_records(
            owner,
            orders.into_iter().map(|o| o.record),
        ))
    }

    fn stored_orders(
        &self,
        owner: &str,
        order_ids: &[String],
    ) -> Result<Vec<OrderRecord>, LedgerError> {
        Ok(self
            .orders
            .borrow()
            .iter()
            .filter(|o| o.owner == owner && order_ids.contains(&o.record.order_id))
            .map(|o| o.record.clone())
            .collect())
    }

    fn insert_orders(&self, owner: &str, orders: &[OrderRecord]) -> Result<(), LedgerError> {
        self.check_writable()?;
        let mut stored = self.orders.borrow_mut();
        for order in orders {
            if stored.iter().any(|o| o.record.order_id == order.order_id) {
                return Err(LedgerError::DatabaseQuery {
                    reason: format!("order {} already exists", order.order_id),
                });
            }
        }
        for order in orders {
            let now = self.tick();
            stored.push(StoredOrder {
                owner: owner.to_string(),
                record: order.clone(),
                created: now,
                updated: now,
            });
        }
        Ok(())
    }

    fn update_order(&self, owner: &str, order: &OrderRecord) -> Result<(), LedgerError> {
        self.check_writable()?;
        let now = self.tick();
        let mut stored = self.orders.borrow_mut();
        let existing = stored
            .iter_mut()
            .find(|o| o.owner == owner && o.record.order_id == order.order_id)
            .ok_or_else(|| LedgerError::DatabaseQuery {
                reason: format!("order {} does not exist", order.order_id),
            })?;
        existing.record = order.clone();
        existing.updated = now;
        Ok(())
    }

    fn apply_plan(&self, owner: &str, plan: &ReconcilePlan) -> Result<(), LedgerError> {
        self.apply_calls.set(self.apply_calls.get() + 1);
        self.check_writable()?;
        let snapshot = self.orders.borrow().clone();
        let result = self.insert_orders(owner, &plan.to_create).and_then(|_| {
            plan.to_update
                .iter()
                .try_for_each(|order| self.update_order(owner, order))
        });
        if result.is_err() {
            *self.orders.borrow_mut() = snapshot;
        }
        result
    }

    fn recent_orders(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredOrder>, LedgerError> {
        let mut orders: Vec<StoredOrder> = self
            .orders
            .borrow()
            .iter()
            .filter(|o| owner.is_none_or(|w| o.owner == w))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created.cmp(&a.created));
        orders.truncate(limit);
        Ok(orders)
    }
}

/// Builder for synthetic invoice pages in the layout the extractor reads.
pub struct InvoiceHtml {
    order_date: Option<String>,
    items: Vec<(String, String)>,
    charges: Vec<(String, String)>,
    grand_total: Option<String>,
}

impl InvoiceHtml {
    pub fn new() -> Self {
        Self {
            order_date: None,
            items: Vec::new(),
            charges: Vec::new(),
            grand_total: None,
        }
    }

    pub fn placed(mut self, date: &str) -> Self {
        self.order_date = Some(date.to_string());
        self
    }

    pub fn item(mut self, name: &str, price: &str) -> Self {
        self.items.push((name.to_string(), price.to_string()));
        self
    }

    /// `card` is the full card cell text, e.g. "Visa ending in 1234: May 1, 2024:".
    pub fn charge(mut self, card: &str, amount: &str) -> Self {
        self.charges.push((card.to_string(), amount.to_string()));
        self
    }

    pub fn grand_total(mut self, amount: &str) -> Self {
        self.grand_total = Some(amount.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut html = String::from("<html><body>\n<table>\n");
        if let Some(date) = &self.order_date {
            html.push_str(&format!(
                "<tr><td><b>Order Placed:</b> {date}</td></tr>\n"
            ));
        }
        html.push_str("</table>\n<table>\n");
        for (name, price) in &self.items {
            html.push_str(&format!(
                "<tr><td><i>{name}</i><br><span>Sold by: Example Seller</span></td><td>{price}</td></tr>\n"
            ));
        }
        html.push_str("</table>\n<table>\n");
        if let Some(total) = &self.grand_total {
            html.push_str(&format!(
                "<tr><td><b>Grand Total:</b></td><td>{total}</td></tr>\n"
            ));
        }
        if !self.charges.is_empty() {
            html.push_str("<tr><td><b>Credit Card transactions</b></td><td><table>\n");
            for (card, amount) in &self.charges {
                html.push_str(&format!("<tr><td>{card}</td><td>{amount}</td></tr>\n"));
            }
            html.push_str("</table></td></tr>\n");
        }
        html.push_str("</table>\n</body></html>\n");
        html
    }
}

/// A two-item invoice paid with a card and a gift card.
pub fn standard_invoice() -> InvoiceHtml {
    InvoiceHtml::new()
        .placed("November 2, 2024")
        .item("USB-C Cable, 6ft", "$9.99")
        .item("Desk Lamp", "$24.50")
        .grand_total("$37.18")
        .charge("Visa ending in 1234: November 3, 2024:", "$30.00")
        .charge("Gift Card ending in 9876: November 3, 2024:", "$7.18")
}

pub fn listing_html(ids: &[&str]) -> String {
    let mut html = String::from("<html><body><div id=\"orders\">\n");
    for id in ids {
        html.push_str(&format!(
            "<div class=\"order-card js-order-card\"><div class=\"yohtmlc-order-id\">\
             <span class=\"label\">Order #</span><span dir=\"ltr\">{id}</span></div></div>\n"
        ));
    }
    html.push_str("</div></body></html>\n");
    html
}

/// Write `html` to `<dir>/<order_id>.html`.
pub fn write_invoice(dir: &Path, order_id: &str, html: &str) -> PathBuf {
    let path = dir.join(format!("{order_id}.html"));
    std::fs::write(&path, html).unwrap();
    path
}
