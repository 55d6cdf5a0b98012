//! CLI integration tests for config loading and the sync command.
//!
//! Tests cover:
//! - Sync config resolution from real INI files on disk
//! - `sync_invoices` against CSV and SQLite stores in a temp directory
//! - Dry runs, unreadable invoices, and idempotent reruns
//! - Exit codes from `run` for good and bad configs

mod common;

use clap::Parser;
use common::*;
use order_ledger::cli::{self, open_store, sync_invoices, Cli};
use order_ledger::domain::error::LedgerError;
use order_ledger::domain::sync_config::{build_sync_config, StoreBackend, SyncConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn ledger_ini(backend: &str, store_path: &Path) -> String {
    format!(
        "[store]\nbackend = {backend}\npath = {}\n\n[sync]\nowner = Alice\nknown_order_limit = 50\n\n[log]\nlevel = warn\nansi = false\n",
        store_path.display()
    )
}

fn sync_config(dir: &TempDir, backend: &str, file: &str) -> SyncConfig {
    let ini = write_temp_ini(&ledger_ini(backend, &dir.path().join(file)));
    let adapter = cli::load_config(ini.path()).unwrap();
    build_sync_config(&adapter, None).unwrap()
}

fn invoices(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_invoice(dir, "111-0000001-0000001", &standard_invoice().build()),
        write_invoice(
            dir,
            "111-0000002-0000002",
            &InvoiceHtml::new()
                .placed("January 5, 2024")
                .item("Pen", "$1.00")
                .grand_total("$1.08")
                .build(),
        ),
    ]
}

mod config_loading {
    use super::*;

    #[test]
    fn loads_sync_config_from_disk() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "csv", "orders.csv");
        assert_eq!(config.owner, "Alice");
        assert_eq!(config.known_order_limit, 50);
        assert_eq!(config.store.backend, StoreBackend::Csv);
        assert_eq!(config.store.path, dir.path().join("orders.csv"));
    }

    #[test]
    fn owner_flag_overrides_config() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&ledger_ini("csv", &dir.path().join("orders.csv")));
        let adapter = cli::load_config(ini.path()).unwrap();
        let config = build_sync_config(&adapter, Some("Bob")).unwrap();
        assert_eq!(config.owner, "Bob");
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        assert!(matches!(
            cli::load_config(Path::new("/nonexistent/ledger.ini")),
            Err(LedgerError::ConfigParse { .. })
        ));
    }
}

mod sync_command {
    use super::*;

    #[test]
    fn sync_creates_then_is_idempotent_csv() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "csv", "orders.csv");
        let store = open_store(&config.store).unwrap();
        let files = invoices(dir.path());

        let first = sync_invoices(&config, store.as_ref(), &files, false).unwrap();
        assert_eq!(first.plan.to_create.len(), 2);
        assert!(first.applied);
        assert!(first.failed.is_empty());

        let second = sync_invoices(&config, store.as_ref(), &files, false).unwrap();
        assert!(second.plan.is_noop());
        assert!(!second.applied);
        assert_eq!(
            second.plan.unchanged,
            vec!["111-0000001-0000001", "111-0000002-0000002"]
        );
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sync_creates_then_is_idempotent_sqlite() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "sqlite", "orders.db");
        let store = open_store(&config.store).unwrap();
        let files = invoices(dir.path());

        let first = sync_invoices(&config, store.as_ref(), &files, false).unwrap();
        assert_eq!(first.plan.write_count(), 2);

        let reopened = open_store(&config.store).unwrap();
        let second = sync_invoices(&config, reopened.as_ref(), &files, false).unwrap();
        assert!(second.plan.is_noop());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "csv", "orders.csv");
        let store = open_store(&config.store).unwrap();
        let files = invoices(dir.path());

        let report = sync_invoices(&config, store.as_ref(), &files, true).unwrap();
        assert_eq!(report.plan.to_create.len(), 2);
        assert!(!report.applied);
        assert!(store.recent_orders(None, 10).unwrap().is_empty());
    }

    #[test]
    fn unreadable_invoices_are_skipped() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "csv", "orders.csv");
        let store = open_store(&config.store).unwrap();
        let mut files = invoices(dir.path());
        files.push(dir.path().join("missing.html"));
        files.push(write_invoice(dir.path(), "blank", "no markup here"));

        let report = sync_invoices(&config, store.as_ref(), &files, false).unwrap();
        assert_eq!(report.plan.to_create.len(), 2);
        assert_eq!(report.failed, vec!["missing", "blank"]);
    }

    #[test]
    fn changed_invoice_is_updated_in_place() {
        let dir = TempDir::new().unwrap();
        let config = sync_config(&dir, "csv", "orders.csv");
        let store = open_store(&config.store).unwrap();
        let files = invoices(dir.path());
        sync_invoices(&config, store.as_ref(), &files, false).unwrap();

        write_invoice(
            dir.path(),
            "111-0000002-0000002",
            &InvoiceHtml::new()
                .placed("January 5, 2024")
                .item("Pen", "$1.00")
                .charge("Visa ending in 1234: January 6, 2024:", "$1.08")
                .build(),
        );
        let report = sync_invoices(&config, store.as_ref(), &files, false).unwrap();
        assert!(report.plan.to_create.is_empty());
        assert_eq!(report.plan.to_update.len(), 1);
        assert_eq!(store.recent_orders(Some("Alice"), 10).unwrap().len(), 2);
    }

    #[test]
    fn order_older_than_known_window_is_updated() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(
            &ledger_ini("csv", &dir.path().join("orders.csv"))
                .replace("known_order_limit = 50", "known_order_limit = 1"),
        );
        let adapter = cli::load_config(ini.path()).unwrap();
        let config = build_sync_config(&adapter, None).unwrap();
        assert_eq!(config.known_order_limit, 1);
        let store = open_store(&config.store).unwrap();
        let files = invoices(dir.path());
        sync_invoices(&config, store.as_ref(), &files[..1], false).unwrap();
        sync_invoices(&config, store.as_ref(), &files[1..], false).unwrap();

        let old = write_invoice(
            dir.path(),
            "111-0000001-0000001",
            &standard_invoice().item("AA Batteries", "$3.00").build(),
        );
        let new = write_invoice(dir.path(), "111-0000003-0000003", &standard_invoice().build());
        let report = sync_invoices(&config, store.as_ref(), &[old, new], false).unwrap();
        assert!(report.applied);
        assert_eq!(report.plan.to_create.len(), 1);
        assert_eq!(report.plan.to_create[0].order_id, "111-0000003-0000003");
        assert_eq!(report.plan.to_update.len(), 1);
        assert_eq!(report.plan.to_update[0].order_id, "111-0000001-0000001");
        assert_eq!(store.recent_orders(Some("Alice"), 10).unwrap().len(), 3);
    }
}

mod run_exit_codes {
    use super::*;

    #[test]
    fn init_db_and_history_succeed() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&ledger_ini("csv", &dir.path().join("orders.csv")));
        let config = ini.path().to_str().unwrap();

        let code = cli::run(Cli::parse_from(["order-ledger", "init-db", "--config", config]));
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(dir.path().join("orders.csv").exists());

        let code = cli::run(Cli::parse_from(["order-ledger", "history", "--config", config]));
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn sync_through_run_succeeds() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&ledger_ini("csv", &dir.path().join("orders.csv")));
        let files = invoices(dir.path());

        let mut args = vec![
            "order-ledger".to_string(),
            "sync".to_string(),
            "--config".to_string(),
            ini.path().display().to_string(),
        ];
        args.extend(files.iter().map(|f| f.display().to_string()));
        assert_eq!(cli::run(Cli::parse_from(args)), ExitCode::SUCCESS);
    }

    #[test]
    fn missing_owner_is_config_exit_code() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&format!(
            "[store]\nbackend = csv\npath = {}\n",
            dir.path().join("orders.csv").display()
        ));
        let invoice = write_invoice(dir.path(), "A", &standard_invoice().build());
        let code = cli::run(Cli::parse_from([
            "order-ledger",
            "sync",
            "--config",
            ini.path().to_str().unwrap(),
            invoice.to_str().unwrap(),
        ]));
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn unreadable_invoice_for_extract_is_document_exit_code() {
        let code = cli::run(Cli::parse_from([
            "order-ledger",
            "extract",
            "--invoice",
            "/nonexistent/invoice.html",
        ]));
        assert_eq!(code, ExitCode::from(4));
    }
}
