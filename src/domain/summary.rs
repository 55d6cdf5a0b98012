//! Plain-text order history.

use crate::domain::amount::format_amount;
use crate::domain::order::StoredOrder;
use chrono::Datelike;
use std::fmt;

const NAME_WIDTH: usize = 100;

/// One order rendered as a header line plus one line per item.
pub struct OrderSummary<'a>(pub &'a StoredOrder);

impl fmt::Display for OrderSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = self.0;
        let record = &order.record;

        let date = match record.order_date {
            Some(d) => format!("{}/{}/{}", d.month(), d.day(), d.year()),
            None => "unknown date".to_string(),
        };
        let charges = if record.transactions.is_empty() {
            format_amount(record.total)
        } else {
            record
                .transactions
                .iter()
                .map(|t| format_amount(t.amount))
                .collect::<Vec<_>>()
                .join(", ")
        };

        write!(f, "{date} | {} | {charges}", order.owner)?;
        for item in &record.items {
            let name: String = item.name.chars().take(NAME_WIDTH).collect();
            write!(f, "\n  {} - {name}", format_amount(item.price))?;
        }
        Ok(())
    }
}

/// Render orders newest first by order date; undated orders go last.
pub fn render_history(orders: &[StoredOrder]) -> String {
    let mut sorted: Vec<&StoredOrder> = orders.iter().collect();
    sorted.sort_by(|a, b| match (a.record.order_date, b.record.order_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.created.cmp(&a.created),
    });
    sorted
        .into_iter()
        .map(|o| OrderSummary(o).to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}
