//! Explicit configuration for a reconciliation run.
//!
//! Everything a sync needs is resolved here once, from a [`ConfigPort`] plus
//! command-line overrides, and passed down as a plain value.

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const DEFAULT_KNOWN_ORDER_LIMIT: usize = 50;
pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Csv,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" => Some(StoreBackend::Sqlite),
            "csv" | "file" => Some(StoreBackend::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Partition key for known orders; opaque to reconciliation.
    pub owner: String,
    pub known_order_limit: usize,
    pub store: StoreConfig,
}

fn invalid(section: &str, key: &str, reason: &str) -> LedgerError {
    LedgerError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

pub fn build_store_config(config: &dyn ConfigPort) -> Result<StoreConfig, LedgerError> {
    let backend = match config.get_string("store", "backend") {
        Some(value) => StoreBackend::parse(&value)
            .ok_or_else(|| invalid("store", "backend", "expected sqlite or csv"))?,
        None => StoreBackend::Sqlite,
    };

    let path = config
        .get_string("store", "path")
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| LedgerError::ConfigMissing {
            section: "store".into(),
            key: "path".into(),
        })?;

    let pool_size = config.get_int("store", "pool_size", DEFAULT_POOL_SIZE as i64);
    if pool_size < 1 {
        return Err(invalid("store", "pool_size", "must be at least 1"));
    }
    let pool_size = u32::try_from(pool_size)
        .map_err(|_| invalid("store", "pool_size", "too large"))?;

    Ok(StoreConfig {
        backend,
        path: PathBuf::from(path.trim()),
        pool_size,
    })
}

/// Resolve the owner (override first, then `[sync] owner`) and limits.
pub fn build_sync_config(
    config: &dyn ConfigPort,
    owner_override: Option<&str>,
) -> Result<SyncConfig, LedgerError> {
    let owner = match owner_override {
        Some(o) => o.to_string(),
        None => config
            .get_string("sync", "owner")
            .ok_or_else(|| LedgerError::ConfigMissing {
                section: "sync".into(),
                key: "owner".into(),
            })?,
    };
    let owner = owner.trim().to_string();
    if owner.is_empty() {
        return Err(invalid("sync", "owner", "must not be empty"));
    }

    let limit = config.get_int("sync", "known_order_limit", DEFAULT_KNOWN_ORDER_LIMIT as i64);
    if limit < 1 {
        return Err(invalid("sync", "known_order_limit", "must be at least 1"));
    }

    Ok(SyncConfig {
        owner,
        known_order_limit: limit as usize,
        store: build_store_config(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const VALID_INI: &str = r#"
[store]
backend = csv
path = /var/lib/orders/orders.csv

[sync]
owner = Alice
known_order_limit = 25
"#;

    #[test]
    fn builds_from_full_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = build_sync_config(&adapter, None).unwrap();
        assert_eq!(config.owner, "Alice");
        assert_eq!(config.known_order_limit, 25);
        assert_eq!(config.store.backend, StoreBackend::Csv);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/orders/orders.csv"));
        assert_eq!(config.store.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn owner_override_wins() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = build_sync_config(&adapter, Some(" Bob ")).unwrap();
        assert_eq!(config.owner, "Bob");
    }

    #[test]
    fn defaults_apply() {
        let adapter =
            FileConfigAdapter::from_string("[store]\npath = orders.db\n[sync]\nowner = Alice\n")
                .unwrap();
        let config = build_sync_config(&adapter, None).unwrap();
        assert_eq!(config.known_order_limit, DEFAULT_KNOWN_ORDER_LIMIT);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn missing_owner_is_reported() {
        let adapter = FileConfigAdapter::from_string("[store]\npath = orders.db\n").unwrap();
        match build_sync_config(&adapter, None) {
            Err(LedgerError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sync");
                assert_eq!(key, "owner");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn missing_store_path_is_reported() {
        let adapter = FileConfigAdapter::from_string("[sync]\nowner = Alice\n").unwrap();
        assert!(matches!(
            build_sync_config(&adapter, None),
            Err(LedgerError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn zero_limit_is_invalid() {
        let adapter = FileConfigAdapter::from_string(
            "[store]\npath = orders.db\n[sync]\nowner = Alice\nknown_order_limit = 0\n",
        )
        .unwrap();
        assert!(matches!(
            build_sync_config(&adapter, None),
            Err(LedgerError::ConfigInvalid { key, .. }) if key == "known_order_limit"
        ));
    }

    #[test]
    fn unknown_backend_is_invalid() {
        let adapter =
            FileConfigAdapter::from_string("[store]\nbackend = mongo\npath = x\n").unwrap();
        assert!(matches!(
            build_store_config(&adapter),
            Err(LedgerError::ConfigInvalid { key, .. }) if key == "backend"
        ));
    }

    #[test]
    fn oversized_pool_is_invalid() {
        let adapter = FileConfigAdapter::from_string(&format!(
            "[store]\npath = orders.db\npool_size = {}\n",
            u64::from(u32::MAX) + 1
        ))
        .unwrap();
        assert!(matches!(
            build_store_config(&adapter),
            Err(LedgerError::ConfigInvalid { key, .. }) if key == "pool_size"
        ));
    }

    #[test]
    fn pool_size_is_read() {
        let adapter =
            FileConfigAdapter::from_string("[store]\npath = orders.db\npool_size = 8\n").unwrap();
        assert_eq!(build_store_config(&adapter).unwrap().pool_size, 8);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!(StoreBackend::parse("SQLite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::parse(" csv "), Some(StoreBackend::Csv));
        assert_eq!(StoreBackend::parse("file"), Some(StoreBackend::Csv));
        assert_eq!(StoreBackend::parse("pg"), None);
    }
}
