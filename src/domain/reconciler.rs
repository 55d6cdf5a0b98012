//! Reconciliation of freshly extracted orders against persisted ones.
//!
//! Pure set logic: nothing here reads or writes storage. The caller loads a
//! [`KnownOrderIndex`] for one owner, calls [`reconcile`], and hands the
//! resulting [`ReconcilePlan`] to an order store in a single atomic write.

use crate::domain::order::OrderRecord;
use std::collections::HashMap;

/// Order ids already persisted for one owner, most recent first.
///
/// An entry may carry the stored record, which lets [`reconcile`] tell an
/// unchanged re-extraction from an update. Entries without a record are
/// treated as unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownOrderIndex {
    owner: String,
    ids: Vec<String>,
    stored: HashMap<String, Option<OrderRecord>>,
}

impl KnownOrderIndex {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ids: Vec::new(),
            stored: HashMap::new(),
        }
    }

    /// Index of bare ids, given most recent first.
    pub fn from_ids<I, S>(owner: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new(owner);
        for id in ids {
            index.push_known(id.into(), None);
        }
        index
    }

    /// Index carrying stored snapshots, given most recent first.
    pub fn from_records<I>(owner: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = OrderRecord>,
    {
        let mut index = Self::new(owner);
        for record in records {
            index.push_known(record.order_id.clone(), Some(record));
        }
        index
    }

    fn push_known(&mut self, id: String, record: Option<OrderRecord>) {
        if !self.stored.contains_key(&id) {
            self.ids.push(id.clone());
        }
        let entry = self.stored.entry(id).or_insert(None);
        if record.is_some() {
            *entry = record;
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.stored.contains_key(order_id)
    }

    pub fn stored(&self, order_id: &str) -> Option<&OrderRecord> {
        self.stored.get(order_id).and_then(Option::as_ref)
    }

    /// Keep only the `limit` most recent entries.
    pub fn truncate(&mut self, limit: usize) {
        if self.ids.len() <= limit {
            return;
        }
        for dropped in self.ids.drain(limit..) {
            self.stored.remove(&dropped);
        }
    }

    /// Add stored records older than every current entry. Ids already
    /// present keep their place.
    pub fn include_stored<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = OrderRecord>,
    {
        for record in records {
            self.push_known(record.order_id.clone(), Some(record));
        }
    }

    /// Record a plan as persisted: created and updated orders become the most
    /// recent known entries.
    pub fn absorb(&mut self, plan: &ReconcilePlan) {
        let written: Vec<&OrderRecord> = plan.to_create.iter().chain(&plan.to_update).collect();
        for record in written.iter().rev() {
            self.ids.retain(|id| id != &record.order_id);
            self.ids.insert(0, record.order_id.clone());
            self.stored
                .insert(record.order_id.clone(), Some((*record).clone()));
        }
    }
}

/// Where a single extracted record ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    New,
    Updated,
    Unchanged,
}

/// Writes needed to bring the store in line with one batch.
///
/// The whole plan must be applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub to_create: Vec<OrderRecord>,
    pub to_update: Vec<OrderRecord>,
    pub unchanged: Vec<String>,
}

impl ReconcilePlan {
    /// True when applying the plan would write nothing.
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.to_create.len() + self.to_update.len()
    }
}

pub fn classify(record: &OrderRecord, index: &KnownOrderIndex) -> Disposition {
    if !index.contains(&record.order_id) {
        return Disposition::New;
    }
    match index.stored(&record.order_id) {
        Some(stored) if !stored.same_content(record) => Disposition::Updated,
        _ => Disposition::Unchanged,
    }
}

/// Collapse records sharing an id into one, keeping the first position and
/// the last content.
fn dedup_by_id(batch: Vec<OrderRecord>) -> Vec<OrderRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<OrderRecord> = Vec::with_capacity(batch.len());
    for record in batch {
        match positions.get(&record.order_id) {
            Some(&pos) => unique[pos] = record,
            None => {
                positions.insert(record.order_id.clone(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

/// Partition `batch` into creates, updates and no-ops, preserving input order.
///
/// Ids present in `index` are never created again, and a batch that repeats
/// an id yields a single write for it.
pub fn reconcile(batch: Vec<OrderRecord>, index: &KnownOrderIndex) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    for record in dedup_by_id(batch) {
        match classify(&record, index) {
            Disposition::New => plan.to_create.push(record),
            Disposition::Updated => plan.to_update.push(record),
            Disposition::Unchanged => plan.unchanged.push(record.order_id),
        }
    }
    plan
}
