//! Domain error types and field-level anomalies.

/// Failure to read an invoice document at all.
///
/// This is the only extraction outcome that yields no [`OrderRecord`]; every
/// other miss degrades a single field and is reported as a [`FieldAnomaly`].
///
/// [`OrderRecord`]: crate::domain::order::OrderRecord
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("unreadable document for order {order_id}: {reason}")]
    UnreadableDocument { order_id: String, reason: String },
}

/// A recoverable miss recorded while extracting one order.
///
/// The extractor resolves each of these to a safe default (null, 0, or an
/// omitted entry) and hands them back so the caller can decide how loudly to
/// report them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldAnomaly {
    MissingOrderDate,
    UnparseableOrderDate { text: String },
    /// A "Sold by:" marker whose item name could not be resolved.
    DroppedItem { position: usize },
    MissingItemPrice { name: String },
    MalformedAmount { context: &'static str, text: String },
    /// A transaction row that ended with a partially filled charge.
    IncompleteTransaction { row: usize },
    MissingTotal,
}

impl std::fmt::Display for FieldAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldAnomaly::MissingOrderDate => write!(f, "order date not found"),
            FieldAnomaly::UnparseableOrderDate { text } => {
                write!(f, "order date not recognised: {text:?}")
            }
            FieldAnomaly::DroppedItem { position } => {
                write!(f, "item marker #{position} has no name, dropped")
            }
            FieldAnomaly::MissingItemPrice { name } => {
                write!(f, "no price cell for item {name:?}, using 0")
            }
            FieldAnomaly::MalformedAmount { context, text } => {
                write!(f, "malformed {context} amount {text:?}, using 0")
            }
            FieldAnomaly::IncompleteTransaction { row } => {
                write!(f, "transaction row #{row} ended with a partial charge")
            }
            FieldAnomaly::MissingTotal => {
                write!(f, "no transactions or grand total found, total is 0")
            }
        }
    }
}

/// Top-level error type for order-ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("document error in {source_name}: {reason}")]
    Document { source_name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => 3,
            LedgerError::Extraction(_) | LedgerError::Document { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
