//! CLI definition and dispatch.

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_document::HtmlDocument;
use crate::domain::error::{ExtractionError, LedgerError};
use crate::domain::extraction::{extract_batch, extract_order, Extraction};
use crate::domain::listing::{extract_recent_order_ids, DEFAULT_LISTING_LIMIT};
use crate::domain::reconciler::{reconcile, ReconcilePlan};
use crate::domain::summary::render_history;
use crate::domain::sync_config::{
    build_store_config, build_sync_config, StoreBackend, StoreConfig, SyncConfig,
};
use crate::logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::document_port::DocumentTree;
use crate::ports::order_store_port::OrderStorePort;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "order-ledger", about = "Invoice extraction and order reconciliation")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one invoice and print it as JSON
    Extract {
        #[arg(short, long)]
        invoice: PathBuf,
        /// Defaults to the invoice file stem
        #[arg(long)]
        order_id: Option<String>,
    },
    /// List recent order ids from an order listing page
    Ids {
        #[arg(short, long)]
        listing: PathBuf,
        #[arg(short = 'n', long, default_value_t = DEFAULT_LISTING_LIMIT)]
        limit: usize,
    },
    /// Extract invoices and reconcile them against the store
    Sync {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(required = true)]
        invoices: Vec<PathBuf>,
    },
    /// Print stored orders, newest first
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        owner: Option<String>,
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Create the order store
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let verbose = cli.verbose;
    let result = match cli.command {
        Command::Extract { invoice, order_id } => {
            logging::init(verbose, None, true);
            run_extract(&invoice, order_id.as_deref())
        }
        Command::Ids { listing, limit } => {
            logging::init(verbose, None, true);
            run_ids(&listing, limit)
        }
        Command::Sync {
            config,
            owner,
            dry_run,
            invoices,
        } => with_config(&config, verbose, |cfg| {
            run_sync(cfg, owner.as_deref(), dry_run, &invoices)
        }),
        Command::History {
            config,
            owner,
            limit,
        } => with_config(&config, verbose, |cfg| {
            run_history(cfg, owner.as_deref(), limit)
        }),
        Command::InitDb { config } => with_config(&config, verbose, run_init_db),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LedgerError> {
    FileConfigAdapter::from_file(path)
}

fn with_config<F>(path: &Path, verbose: u8, command: F) -> Result<(), LedgerError>
where
    F: FnOnce(&FileConfigAdapter) -> Result<(), LedgerError>,
{
    let config = load_config(path)?;
    let level = config.get_string("log", "level");
    logging::init(verbose, level.as_deref(), config.get_bool("log", "ansi", true));
    debug!("loaded config from {}", path.display());
    command(&config)
}

/// Order id for an invoice file: its stem.
pub fn order_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_document(path: &Path) -> Result<HtmlDocument, LedgerError> {
    let document = HtmlDocument::from_file(path)?;
    debug!("parsed {} nodes from {}", document.node_count(), path.display());
    Ok(document)
}

fn log_anomalies(extraction: &Extraction) {
    for anomaly in &extraction.anomalies {
        warn!("order {}: {}", extraction.record.order_id, anomaly);
    }
}

/// Open the configured store, creating its schema when needed.
pub fn open_store(store: &StoreConfig) -> Result<Box<dyn OrderStorePort>, LedgerError> {
    match store.backend {
        StoreBackend::Csv => {
            let adapter = CsvAdapter::new(store.path.clone());
            adapter.initialize()?;
            Ok(Box::new(adapter))
        }
        StoreBackend::Sqlite => open_sqlite(store),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(store: &StoreConfig) -> Result<Box<dyn OrderStorePort>, LedgerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(store)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_store: &StoreConfig) -> Result<Box<dyn OrderStorePort>, LedgerError> {
    Err(LedgerError::ConfigInvalid {
        section: "store".into(),
        key: "backend".into(),
        reason: "sqlite feature is required for the sqlite backend".into(),
    })
}

fn run_extract(invoice: &Path, order_id: Option<&str>) -> Result<(), LedgerError> {
    let order_id = order_id
        .map(str::to_string)
        .unwrap_or_else(|| order_id_from_path(invoice));
    let document = read_document(invoice)?;
    let extraction = extract_order(&order_id, &document)?;
    log_anomalies(&extraction);

    let json = serde_json::to_string_pretty(&extraction.record).map_err(std::io::Error::from)?;
    println!("{json}");
    Ok(())
}

fn run_ids(listing: &Path, limit: usize) -> Result<(), LedgerError> {
    let document = read_document(listing)?;
    let ids = extract_recent_order_ids(&document, limit);
    if ids.is_empty() {
        warn!("no order ids found in {}", listing.display());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

/// Result of one sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub plan: ReconcilePlan,
    /// Invoices that could not be read or extracted.
    pub failed: Vec<String>,
    pub applied: bool,
}

/// Extract `invoices`, reconcile them against `store` and apply the plan
/// unless `dry_run` is set.
///
/// An unreadable invoice is logged and skipped; the rest of the batch still
/// goes through.
pub fn sync_invoices(
    config: &SyncConfig,
    store: &dyn OrderStorePort,
    invoices: &[PathBuf],
    dry_run: bool,
) -> Result<SyncReport, LedgerError> {
    let mut report = SyncReport::default();

    let mut documents: Vec<(String, HtmlDocument)> = Vec::with_capacity(invoices.len());
    for path in invoices {
        let order_id = order_id_from_path(path);
        match read_document(path) {
            Ok(document) => documents.push((order_id, document)),
            Err(e) => {
                error!("skipping {}: {}", path.display(), e);
                report.failed.push(order_id);
            }
        }
    }

    let batch = extract_batch(
        documents
            .iter()
            .map(|(id, doc)| (id.as_str(), doc as &dyn DocumentTree)),
    );
    for failure in &batch.failures {
        error!("{failure}");
        let ExtractionError::UnreadableDocument { order_id, .. } = failure;
        report.failed.push(order_id.clone());
    }
    for extraction in &batch.extractions {
        log_anomalies(extraction);
    }

    let records = batch.records();
    let known = store.index_for_batch(&config.owner, config.known_order_limit, &records)?;
    info!(
        "{} known orders for {}, {} extracted",
        known.len(),
        config.owner,
        batch.extractions.len()
    );
    report.plan = reconcile(records, &known);

    if !dry_run && !report.plan.is_noop() {
        store.apply_plan(&config.owner, &report.plan)?;
        report.applied = true;
        info!("wrote {} orders for {}", report.plan.write_count(), config.owner);
    }
    Ok(report)
}

fn print_plan(report: &SyncReport, dry_run: bool) {
    for record in &report.plan.to_create {
        println!("create {}", record.order_id);
    }
    for record in &report.plan.to_update {
        println!("update {}", record.order_id);
    }
    for id in &report.plan.unchanged {
        println!("unchanged {id}");
    }
    for id in &report.failed {
        println!("failed {id}");
    }
    if dry_run {
        println!("dry run: {} writes skipped", report.plan.write_count());
    }
}

fn run_sync(
    config: &dyn ConfigPort,
    owner: Option<&str>,
    dry_run: bool,
    invoices: &[PathBuf],
) -> Result<(), LedgerError> {
    let sync_config = build_sync_config(config, owner)?;
    let store = open_store(&sync_config.store)?;
    let report = sync_invoices(&sync_config, store.as_ref(), invoices, dry_run)?;
    print_plan(&report, dry_run);
    Ok(())
}

fn run_history(config: &dyn ConfigPort, owner: Option<&str>, limit: usize) -> Result<(), LedgerError> {
    let store_config = build_store_config(config)?;
    let owner = owner
        .map(str::to_string)
        .or_else(|| config.get_string("sync", "owner"));
    let store = open_store(&store_config)?;
    let orders = store.recent_orders(owner.as_deref(), limit)?;
    if orders.is_empty() {
        info!("no stored orders");
        return Ok(());
    }
    println!("{}", render_history(&orders));
    Ok(())
}

fn run_init_db(config: &FileConfigAdapter) -> Result<(), LedgerError> {
    let store_config = build_store_config(config)?;
    open_store(&store_config)?;
    info!("initialized store at {}", store_config.path.display());
    eprintln!("Store ready at {}", store_config.path.display());
    Ok(())
}
