//! Assembly of one [`OrderRecord`] per invoice document.

use crate::domain::error::{ExtractionError, FieldAnomaly};
use crate::domain::field_extractor::{extract_line_items, extract_order_date, parse_order_date};
use crate::domain::order::OrderRecord;
use crate::domain::total::{compute_total, TotalSource};
use crate::domain::transaction_grouper::extract_transactions;
use crate::ports::document_port::DocumentTree;

/// A record together with everything that had to be defaulted to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: OrderRecord,
    pub total_source: TotalSource,
    pub anomalies: Vec<FieldAnomaly>,
}

/// Outcome of extracting several documents; one failure never stops the rest.
#[derive(Debug, Default)]
pub struct BatchExtraction {
    pub extractions: Vec<Extraction>,
    pub failures: Vec<ExtractionError>,
}

impl BatchExtraction {
    pub fn records(&self) -> Vec<OrderRecord> {
        self.extractions.iter().map(|e| e.record.clone()).collect()
    }
}

/// Extract the invoice for `order_id`.
///
/// Missing fields degrade to `None`, `0` or an omitted entry and are listed in
/// [`Extraction::anomalies`]. Only a document without any element content is
/// an error.
pub fn extract_order(
    order_id: &str,
    tree: &dyn DocumentTree,
) -> Result<Extraction, ExtractionError> {
    let root = tree
        .root()
        .ok_or_else(|| ExtractionError::UnreadableDocument {
            order_id: order_id.to_string(),
            reason: "document has no root node".into(),
        })?;
    if tree.element_children(root).is_empty() {
        return Err(ExtractionError::UnreadableDocument {
            order_id: order_id.to_string(),
            reason: "document has no element content".into(),
        });
    }

    let mut anomalies = Vec::new();

    let order_date = match extract_order_date(tree) {
        Some(text) => {
            let parsed = parse_order_date(&text);
            if parsed.is_none() {
                anomalies.push(FieldAnomaly::UnparseableOrderDate { text });
            }
            parsed
        }
        None => {
            anomalies.push(FieldAnomaly::MissingOrderDate);
            None
        }
    };

    let (items, item_anomalies) = extract_line_items(tree);
    anomalies.extend(item_anomalies);

    let (transactions, tx_anomalies) = extract_transactions(tree);
    anomalies.extend(tx_anomalies);

    let (total, total_source) = compute_total(&transactions, tree);
    if total_source == TotalSource::Missing {
        anomalies.push(FieldAnomaly::MissingTotal);
    }

    Ok(Extraction {
        record: OrderRecord {
            order_id: order_id.to_string(),
            order_date,
            items,
            transactions,
            total,
        },
        total_source,
        anomalies,
    })
}

/// Extract each `(order_id, document)` pair in order.
pub fn extract_batch<'a, I>(documents: I) -> BatchExtraction
where
    I: IntoIterator<Item = (&'a str, &'a dyn DocumentTree)>,
{
    let mut batch = BatchExtraction::default();
    for (order_id, tree) in documents {
        match extract_order(order_id, tree) {
            Ok(extraction) => batch.extractions.push(extraction),
            Err(e) => batch.failures.push(e),
        }
    }
    batch
}
