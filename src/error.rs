//! Error types for dbkit operations.
//!
//! All failures are surfaced as returned values, never used for control
//! flow, and never retried at this layer. The hierarchy uses `thiserror`
//! with a top-level [`Error`] wrapping per-module enums.

use thiserror::Error;

/// Result type alias for dbkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for dbkit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection and statement errors.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// Schema registry and migration errors.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration errors (driver registry misuse and the like).
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Connection-manager and driver errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Operation attempted with no live connection.
    #[error("not connected to database")]
    NotConnected,

    /// Opening or closing the underlying connection failed, or schema
    /// metadata could not be read due to connectivity.
    #[error("connection error: {0}")]
    Connection(String),

    /// No driver with this identifier is registered.
    #[error("unknown driver: {name}")]
    UnknownDriver {
        /// The driver identifier that could not be resolved.
        name: String,
    },

    /// The statement text could not be compiled by the backend.
    #[error("failed to prepare `{query}`: {reason}")]
    Prepare {
        /// The offending query text.
        query: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// A compiled statement failed during execution (constraint violation,
    /// parameter mismatch, type mismatch, etc.).
    #[error("failed to execute `{query}`: {reason}")]
    Execution {
        /// The query text that was executing.
        query: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// A column could not be decoded into the requested Rust type.
    #[error("column {index}: expected {expected}, got {actual}")]
    Decode {
        /// Zero-based column index.
        index: usize,
        /// The requested Rust type.
        expected: &'static str,
        /// What the column actually held.
        actual: &'static str,
    },
}

/// Schema registry and migration errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Migration versions start at 1; version 0 is the implicit
    /// "uninitialized" state and cannot be registered.
    #[error("migration version must be positive")]
    InvalidVersion,

    /// A step with this version is already registered.
    #[error("migration version {version} is already registered")]
    DuplicateVersion {
        /// The version registered twice.
        version: u32,
    },

    /// The requested target version is below the persisted current
    /// version. Downgrades are unsupported.
    #[error("cannot migrate down from version {current} to {target}")]
    Downgrade {
        /// The persisted current version.
        current: u32,
        /// The requested target version.
        target: u32,
    },

    /// A migration procedure returned an error. The persisted version is
    /// left at the last step that succeeded.
    #[error("migration to version {version} failed: {source}")]
    Step {
        /// The version whose procedure failed.
        version: u32,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },
}
