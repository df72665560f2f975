//! Error types for the kvmodel library.

use thiserror::Error;

use crate::store::StoreError;

/// All errors that can occur while reading or writing records.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The primary key of a record, or a container element, is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique-indexed value is already held by another record.
    #[error("Unique conflict on {key}: value {value:?} is held by id {holder}")]
    Conflict {
        key: String,
        value: String,
        holder: String,
    },

    /// Undeclared field, wrongly typed value, or a violated precondition.
    #[error("Bad arguments: {0}")]
    BadArgs(String),

    /// A record key exists but its stored data is unusable.
    #[error("Data corruption at {key}: {detail}")]
    DataCorruption { key: String, detail: String },

    /// Rejected type registration.
    #[error("Invalid type definition for {type_name}: {detail}")]
    Definition { type_name: String, detail: String },

    /// A guarded batch kept losing to concurrent writers.
    #[error("Gave up after {attempts} attempts: watched keys kept changing")]
    Contention { attempts: u32 },

    /// Error reported by the underlying store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub(crate) fn bad_args(msg: impl Into<String>) -> Self {
        Self::BadArgs(msg.into())
    }

    pub(crate) fn corrupt(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::DataCorruption {
            key: key.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn definition(type_name: &str, detail: impl Into<String>) -> Self {
        Self::Definition {
            type_name: type_name.to_string(),
            detail: detail.into(),
        }
    }
}

/// Convenience result type for kvmodel operations.
pub type ModelResult<T> = Result<T, ModelError>;
