//! Order identifiers from the order-history listing page.

use crate::ports::document_port::DocumentTree;

pub const ORDER_CARD_CLASS: &str = "order-card";
pub const ORDER_ID_CLASS: &str = "yohtmlc-order-id";

/// The listing only shows the most recent orders.
pub const DEFAULT_LISTING_LIMIT: usize = 10;

/// Order ids of the first `limit` order cards, skipping cards without one.
pub fn extract_recent_order_ids(tree: &dyn DocumentTree, limit: usize) -> Vec<String> {
    tree.find_all(&|n| tree.has_class(n, ORDER_CARD_CLASS))
        .into_iter()
        .take(limit)
        .filter_map(|card| {
            let holder = tree.find_first_within(card, &|n| tree.has_class(n, ORDER_ID_CLASS))?;
            let span = tree.find_first_within(holder, &|n| {
                tree.has_tag(n, "span") && tree.attribute(n, "dir") == Some("ltr")
            })?;
            let id = tree.text_content(span).trim().to_string();
            (!id.is_empty()).then_some(id)
        })
        .collect()
}
