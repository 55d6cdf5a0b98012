//! Core domain types and logic. Nothing here performs I/O or logs.

pub mod amount;
pub mod error;
pub mod extraction;
pub mod field_extractor;
pub mod listing;
pub mod order;
pub mod reconciler;
pub mod summary;
pub mod sync_config;
pub mod total;
pub mod transaction_grouper;
