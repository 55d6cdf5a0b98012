//! Label-anchored extraction of the order date and line items.
//!
//! Invoice markup shifts between template versions, so nothing here relies on
//! fixed positions: each field is found by the text label printed next to it.

use crate::domain::amount::try_parse_dollar_amount;
use crate::domain::error::FieldAnomaly;
use crate::domain::order::LineItem;
use crate::ports::document_port::{DocumentTree, NodeId};
use chrono::NaiveDate;

pub const ORDER_PLACED_LABEL: &str = "Order Placed:";
pub const SOLD_BY_LABEL: &str = "Sold by:";

const ORDER_DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y", "%d %B %Y"];

/// Bold elements whose text contains `label`, in document order.
pub fn bold_labels(tree: &dyn DocumentTree, label: &str) -> Vec<NodeId> {
    tree.find_all(&|n| tree.has_tag(n, "b") && tree.text_content(n).contains(label))
}

/// Raw order date text, taken from the parent of the first bold
/// "Order Placed:" label.
pub fn extract_order_date(tree: &dyn DocumentTree) -> Option<String> {
    let label = bold_labels(tree, ORDER_PLACED_LABEL).into_iter().next()?;
    let parent = tree.parent(label)?;
    let text = tree.text_content(parent);
    let after = text.rsplit(ORDER_PLACED_LABEL).next().unwrap_or_default();
    Some(after.trim().to_string())
}

/// Interpret the printed order date, e.g. `"November 2, 2024"`.
pub fn parse_order_date(text: &str) -> Option<NaiveDate> {
    let normalized = collapse_whitespace(text);
    ORDER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Line items found next to "Sold by:" markers, plus anomalies for markers
/// that did not resolve.
pub fn extract_line_items(tree: &dyn DocumentTree) -> (Vec<LineItem>, Vec<FieldAnomaly>) {
    let markers =
        tree.find_all(&|n| tree.has_tag(n, "span") && tree.text_content(n).contains(SOLD_BY_LABEL));

    let mut items = Vec::new();
    let mut anomalies = Vec::new();

    for (position, marker) in markers.into_iter().enumerate() {
        let Some(cell) = tree.parent(marker) else {
            anomalies.push(FieldAnomaly::DroppedItem { position });
            continue;
        };

        let name = tree
            .find_first_within(cell, &|n| tree.has_tag(n, "i"))
            .map(|i| collapse_whitespace(&tree.text_content(i)))
            .filter(|name| !name.is_empty());
        let Some(name) = name else {
            anomalies.push(FieldAnomaly::DroppedItem { position });
            continue;
        };

        let price = match tree.next_element_sibling(cell) {
            Some(price_cell) => {
                let text = tree.text_content(price_cell);
                let text = text.trim();
                try_parse_dollar_amount(text).unwrap_or_else(|| {
                    anomalies.push(FieldAnomaly::MalformedAmount {
                        context: "item",
                        text: text.to_string(),
                    });
                    0.0
                })
            }
            None => {
                anomalies.push(FieldAnomaly::MissingItemPrice { name: name.clone() });
                0.0
            }
        };

        items.push(LineItem { name, price });
    }

    (items, anomalies)
}
