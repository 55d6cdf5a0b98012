//! Order persistence port.

use crate::domain::error::LedgerError;
use crate::domain::order::{OrderRecord, StoredOrder};
use crate::domain::reconciler::{KnownOrderIndex, ReconcilePlan};

/// Storage for orders and their nested items and transactions, keyed by
/// order id and partitioned by owner.
pub trait OrderStorePort {
    /// The `limit` most recently created orders of `owner`, with snapshots.
    fn known_orders(&self, owner: &str, limit: usize) -> Result<KnownOrderIndex, LedgerError>;

    /// Stored records of `owner` among `order_ids`, in any order. Unknown ids
    /// are skipped.
    fn stored_orders(
        &self,
        owner: &str,
        order_ids: &[String],
    ) -> Result<Vec<OrderRecord>, LedgerError>;

    /// Index for reconciling `batch`: the `limit` newest orders of `owner`,
    /// plus any older stored order that `batch` mentions.
    fn index_for_batch(
        &self,
        owner: &str,
        limit: usize,
        batch: &[OrderRecord],
    ) -> Result<KnownOrderIndex, LedgerError> {
        let mut index = self.known_orders(owner, limit)?;
        let mut outside: Vec<String> = Vec::new();
        for record in batch {
            if !index.contains(&record.order_id) && !outside.contains(&record.order_id) {
                outside.push(record.order_id.clone());
            }
        }
        if !outside.is_empty() {
            index.include_stored(self.stored_orders(owner, &outside)?);
        }
        Ok(index)
    }

    /// Insert new orders atomically; an id that already exists is an error.
    fn insert_orders(&self, owner: &str, orders: &[OrderRecord]) -> Result<(), LedgerError>;

    /// Replace an existing order, its items and its transactions.
    fn update_order(&self, owner: &str, order: &OrderRecord) -> Result<(), LedgerError>;

    /// Apply every create and update of `plan`, or none of them.
    fn apply_plan(&self, owner: &str, plan: &ReconcilePlan) -> Result<(), LedgerError>;

    /// Persisted orders, newest first by creation; all owners when `owner` is `None`.
    fn recent_orders(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredOrder>, LedgerError>;
}
