//! order-ledger: invoice extraction and order reconciliation.
//!
//! Hexagonal architecture: pure extraction and reconciliation logic in
//! [`domain`], port traits in [`ports`], concrete documents, stores and
//! configuration in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
