//! Port traits at the boundaries of the core.

pub mod config_port;
pub mod document_port;
pub mod order_store_port;
