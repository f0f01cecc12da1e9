//! Error types for Stratum.

use thiserror::Error;

/// Result type alias using StratumError.
pub type Result<T> = std::result::Result<T, StratumError>;

/// Errors that can occur in Stratum operations.
///
/// Full buckets and missed search windows are not errors; they are resolved
/// by splitting, growing, promoting, or reporting "not found".
#[derive(Debug, Error)]
pub enum StratumError {
    // Construction errors
    #[error("Cannot build a table from an empty row set")]
    EmptyTable,

    #[error("Row has {actual} values, schema expects {expected}")]
    RowArity { expected: usize, actual: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    // Learned index errors
    #[error("Learned index queried before fit")]
    IndexNotTrained,

    #[error("Keys not sorted ascending at position {position}")]
    UnsortedKeys { position: usize },

    // Directory errors
    #[error("Directory reference cycle starting at slot {index}")]
    ReferenceCycle { index: usize },

    #[error("Directory slot {index} resolves to no bucket")]
    UnownedSlot { index: usize },

    #[error("Directory reached maximum global depth {depth}")]
    DirectoryExhausted { depth: u32 },

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
