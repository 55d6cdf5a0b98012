//! Authoritative order total.
//!
//! Itemized card charges win over the printed grand total because they are
//! what actually hit the customer's instruments; the grand total row is only
//! consulted when no charge could be reconstructed.

use crate::domain::amount::{parse_dollar_amount, round2};
use crate::domain::order::Transaction;
use crate::domain::transaction_grouper::labelled_rows;
use crate::ports::document_port::{DocumentTree, NodeId};

pub const GRAND_TOTAL_LABEL: &str = "Grand Total:";

/// Which computation produced a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSource {
    Transactions,
    GrandTotal,
    Missing,
}

/// Sum of every "Grand Total:" row, or `None` when the label is absent.
///
/// Each row contributes its innermost cells containing `$`. Several labelled
/// rows are added together.
pub fn grand_total(tree: &dyn DocumentTree) -> Option<f64> {
    let rows = labelled_rows(tree, GRAND_TOTAL_LABEL);
    if rows.is_empty() {
        return None;
    }
    let sum = rows
        .into_iter()
        .flat_map(|row| amount_cells(tree, row))
        .map(|cell| parse_dollar_amount(tree.text_content(cell).trim()))
        .sum();
    Some(sum)
}

fn amount_cells(tree: &dyn DocumentTree, row: NodeId) -> Vec<NodeId> {
    let has_dollar = |n: NodeId| tree.has_tag(n, "td") && tree.text_content(n).contains('$');
    tree.find_within(row, &has_dollar)
        .into_iter()
        .filter(|cell| tree.find_first_within(*cell, &has_dollar).is_none())
        .collect()
}

/// Round the charges when there are any, otherwise fall back to the grand
/// total, otherwise zero.
pub fn compute_total(transactions: &[Transaction], tree: &dyn DocumentTree) -> (f64, TotalSource) {
    if !transactions.is_empty() {
        let sum: f64 = transactions.iter().map(|t| t.amount).sum();
        return (round2(sum), TotalSource::Transactions);
    }
    match grand_total(tree) {
        Some(sum) => (round2(sum), TotalSource::GrandTotal),
        None => (0.0, TotalSource::Missing),
    }
}
