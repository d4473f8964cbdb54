//! Error types for the Pokédex ingestion workspace.
//!
//! Library crates use [`PokedexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-record errors ([`PokedexError::NotFound`], [`PokedexError::MalformedRecord`])
//! are recovered inside an ingestion run. Everything else ends the run.

use std::path::PathBuf;

/// Top-level error type for all Pokédex operations.
#[derive(Debug, thiserror::Error)]
pub enum PokedexError {
    /// Network/HTTP failure reaching an external source.
    #[error("transport error: {0}")]
    Transport(String),

    /// The source has no data for this identifier.
    #[error("not found: record {id} in {source_name}")]
    NotFound { source_name: String, id: i64 },

    /// A required field is missing or unparseable.
    #[error("malformed record {id:?}: {message}")]
    MalformedRecord { id: Option<i64>, message: String },

    /// Store write or query failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input or query outcome (unknown Pokémon name, bad range, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PokedexError>;

impl PokedexError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-record error, optionally tagged with the record id.
    pub fn malformed(id: Option<i64>, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id,
            message: msg.into(),
        }
    }

    /// Create a not-found error for `id` in the named source.
    pub fn not_found(source_name: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            source_name: source_name.into(),
            id,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether an ingestion run may skip this record and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MalformedRecord { .. })
    }
}
