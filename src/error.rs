// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Error types for lookup-table operations.
//!
//! Expected absence (a table file that does not exist yet, an unknown source
//! key, a query outside the stored data) is reported through `Option` or
//! empty collections, never through [`Error`].

use thiserror::Error;

/// Result type for lookup-table operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the time system, the extractors and the lookup tables.
#[derive(Error, Debug)]
pub enum Error {
    /// A stored or freshly spliced series or provenance index violates its
    /// invariants. Fatal: the affected table must be discarded and reloaded.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Malformed caller input (reversed range, length mismatch, NaN, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A raw or canonical time value outside the representable range.
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// Malformed leap-second table.
    #[error("Leap-second table error at line {line}: {message}")]
    LeapSeconds { line: usize, message: String },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading or atomically replacing a table file.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Table container could not be encoded or decoded.
    #[error("Format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        Error::DataIntegrity(message.into())
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub(crate) fn invalid_time(message: impl Into<String>) -> Self {
        Error::InvalidTime(message.into())
    }

    /// `true` for errors after which the in-memory table must not be reused.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DataIntegrity(_))
    }
}
