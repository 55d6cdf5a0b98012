//! Reconstruction of per-instrument charges from the payment table.
//!
//! The payment section lists each charge as a card cell ("Visa ending in
//! 1234: November 2, 2024:") and an amount cell ("$45.67"), but the number of
//! decorative cells between and around them varies between invoice templates.
//! Cells are therefore fed one at a time through [`ChargeState`], which only
//! reacts to content and emits a [`Transaction`] as soon as a card and an
//! amount have both been seen.

use crate::domain::amount::try_parse_dollar_amount;
use crate::domain::error::FieldAnomaly;
use crate::domain::field_extractor::bold_labels;
use crate::domain::order::Transaction;
use crate::ports::document_port::{DocumentTree, NodeId};

pub const TRANSACTIONS_LABEL: &str = "Credit Card transactions";
pub const ENDING_IN: &str = "ending in";

/// What a single cell contributes to the charge being assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellReading {
    /// Present when the cell names a card; either half may be blank.
    pub card: Option<CardReading>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardReading {
    pub instrument_type: String,
    pub last_four: String,
}

impl CellReading {
    /// Classify one trimmed cell by its content.
    pub fn from_text(text: &str) -> Self {
        let card = text.find(ENDING_IN).map(|idx| {
            let instrument_type = text[..idx].trim().to_string();
            let after = &text[idx + ENDING_IN.len()..];
            let last_four = after.split(':').next().unwrap_or_default().trim().to_string();
            CardReading {
                instrument_type,
                last_four,
            }
        });
        let amount = if text.contains('$') {
            Some(try_parse_dollar_amount(text).unwrap_or(0.0))
        } else {
            None
        };
        Self { card, amount }
    }
}

/// Accumulator for the charge currently being assembled in a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChargeState {
    #[default]
    Empty,
    /// A card cell was seen but its last four digits were blank.
    HasType { instrument_type: String },
    HasTypeAndLast4 {
        instrument_type: String,
        last_four: String,
    },
    /// An amount arrived before any usable card.
    HasAmount { amount: f64 },
    Complete(Transaction),
}

impl ChargeState {
    /// Fold one cell into the state.
    ///
    /// A card cell replaces any earlier card and an amount cell replaces any
    /// earlier amount. `Complete` is terminal; callers take the transaction
    /// with [`ChargeState::take_complete`] before feeding the next cell.
    pub fn step(self, cell: &CellReading) -> ChargeState {
        let (mut card, mut amount, mut partial_type) = match self {
            ChargeState::Empty | ChargeState::Complete(_) => (None, None, None),
            ChargeState::HasType { instrument_type } => (None, None, Some(instrument_type)),
            ChargeState::HasTypeAndLast4 {
                instrument_type,
                last_four,
            } => (
                Some(CardReading {
                    instrument_type,
                    last_four,
                }),
                None,
                None,
            ),
            ChargeState::HasAmount { amount } => (None, Some(amount), None),
        };

        if let Some(reading) = &cell.card {
            partial_type = None;
            if reading.instrument_type.is_empty() || reading.last_four.is_empty() {
                card = None;
                if !reading.instrument_type.is_empty() {
                    partial_type = Some(reading.instrument_type.clone());
                }
            } else {
                card = Some(reading.clone());
            }
        }
        if let Some(value) = cell.amount {
            amount = Some(value);
        }

        match (card, amount) {
            (Some(card), Some(amount)) => ChargeState::Complete(Transaction {
                instrument_type: card.instrument_type,
                last_four: card.last_four,
                amount,
            }),
            (Some(card), None) => ChargeState::HasTypeAndLast4 {
                instrument_type: card.instrument_type,
                last_four: card.last_four,
            },
            (None, Some(amount)) => ChargeState::HasAmount { amount },
            (None, None) => match partial_type {
                Some(instrument_type) => ChargeState::HasType { instrument_type },
                None => ChargeState::Empty,
            },
        }
    }

    /// Split a completed charge off, resetting to `Empty`.
    pub fn take_complete(self) -> (ChargeState, Option<Transaction>) {
        match self {
            ChargeState::Complete(tx) => (ChargeState::Empty, Some(tx)),
            other => (other, None),
        }
    }

    pub fn is_partial(&self) -> bool {
        !matches!(self, ChargeState::Empty | ChargeState::Complete(_))
    }
}

/// Run the charge state machine over a sequence of cell texts.
///
/// Returns the completed transactions and whether the sequence ended with a
/// partially assembled charge, which is discarded.
pub fn group_cells<'a, I>(cells: I) -> (Vec<Transaction>, bool)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = ChargeState::Empty;
    let mut transactions = Vec::new();
    for text in cells {
        let reading = CellReading::from_text(text.trim());
        let (next, completed) = state.step(&reading).take_complete();
        if let Some(tx) = completed {
            transactions.push(tx);
        }
        state = next;
    }
    (transactions, state.is_partial())
}

/// Rows reached by walking up from each bold `label` to its `tr`, deduplicated
/// in discovery order.
pub fn labelled_rows(tree: &dyn DocumentTree, label: &str) -> Vec<NodeId> {
    let mut rows: Vec<NodeId> = Vec::new();
    for bold in bold_labels(tree, label) {
        if let Some(row) = tree.closest(bold, "tr") {
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
    }
    rows
}

/// Cells of `row` (at any depth) that contain no child elements.
pub fn leaf_cells(tree: &dyn DocumentTree, row: NodeId) -> Vec<NodeId> {
    tree.find_within(row, &|n| {
        tree.has_tag(n, "td") && tree.element_children(n).is_empty()
    })
}

/// All charges listed in "Credit Card transactions" blocks.
pub fn extract_transactions(tree: &dyn DocumentTree) -> (Vec<Transaction>, Vec<FieldAnomaly>) {
    let mut transactions = Vec::new();
    let mut anomalies = Vec::new();

    for (row_index, row) in labelled_rows(tree, TRANSACTIONS_LABEL).into_iter().enumerate() {
        let texts: Vec<String> = leaf_cells(tree, row)
            .into_iter()
            .map(|cell| tree.text_content(cell))
            .collect();
        let (row_transactions, dangling) = group_cells(texts.iter().map(String::as_str));
        if dangling {
            anomalies.push(FieldAnomaly::IncompleteTransaction { row: row_index });
        }
        transactions.extend(row_transactions);
    }

    (transactions, anomalies)
}
