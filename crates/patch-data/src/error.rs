//! Error types for the data layer.
//!
//! Driver errors are logged where they happen and replaced by one of these
//! kinds, so callers never depend on the text of a particular engine.

use std::path::PathBuf;

use patch_sql_core::{ArgumentError, Method};

/// Data-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Configuration could not be parsed.
    #[error("error parsing config: {0}")]
    Config(String),

    /// The database could not be reached.
    #[error("error connecting to database")]
    Connect,

    /// A transaction could not be started.
    #[error("error starting transaction")]
    TxStart,

    /// A transaction could not be committed.
    #[error("error committing transaction")]
    TxCommit,

    /// A transaction could not be rolled back.
    ///
    /// Reported in place of the error that caused the rollback.
    #[error("error rolling back transaction")]
    TxRollback,

    /// The statement arguments are incomplete.
    #[error("error parsing arguments: {0}")]
    Arguments(#[from] ArgumentError),

    /// CREATE TABLE failed.
    #[error("error creating table")]
    Create,

    /// DROP TABLE failed.
    #[error("error dropping table")]
    Drop,

    /// SELECT failed.
    #[error("error selecting from database")]
    Select,

    /// INSERT failed.
    #[error("error inserting into database")]
    Insert,

    /// UPDATE failed.
    #[error("error updating database")]
    Update,

    /// DELETE failed.
    #[error("error deleting from database")]
    Delete,

    /// A table still has rows and was not dropped.
    #[error("table is not empty")]
    TableNotEmpty,

    /// The bulk copy accepted a different number of rows than it was given.
    #[error("inserted {copied} of {expected} rows")]
    InsertCount {
        /// Rows handed to the copy.
        expected: u64,
        /// Rows the engine reported as copied.
        copied: u64,
    },

    /// A unique or primary key constraint rejected the write.
    #[error("constraint violation")]
    Conflict,

    /// A bootstrap file could not be read or executed.
    #[error("error initializing database from {0}")]
    InitFile(PathBuf),

    /// A bootstrap file has an extension we do not load.
    #[error("unsupported init file type: {0}")]
    UnsupportedInitFile(PathBuf),
}

impl DataError {
    /// The error reported when executing a statement of kind `method` fails.
    #[must_use]
    pub const fn for_method(method: Method) -> Self {
        match method {
            Method::Create => Self::Create,
            Method::Drop => Self::Drop,
            Method::Select => Self::Select,
            Method::Insert => Self::Insert,
            Method::Update => Self::Update,
            Method::Delete => Self::Delete,
        }
    }
}

/// Result type alias for data-layer operations.
pub type Result<T> = std::result::Result<T, DataError>;
