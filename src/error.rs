//! Error taxonomy for the migrator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    /// A source row lacks a field its record type requires, or the value cannot be decoded.
    #[error("cannot map row of {table}: field {field} {reason}")]
    Mapping {
        table: String,
        field: String,
        reason: String,
    },

    /// A malformed batch was handed to the loader, or the loader was driven out of order.
    #[error("cannot load into {table}: {message}")]
    Load { table: String, message: String },

    /// The target rejected a row because a referenced parent row is missing.
    #[error("referential integrity violated in {table}: {detail}")]
    ReferentialIntegrity { table: String, detail: String },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("source database error: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("target database error: {0}")]
    Target(#[from] postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("migration cancelled")]
    Cancelled,
}

impl MigrateError {
    pub fn mapping(
        table: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        MigrateError::Mapping {
            table: table.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Load {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// A mismatch found by the post-run verification pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("{table}: source has {source_count} rows, target has {target_count}")]
    RowCount {
        table: String,
        source_count: i64,
        target_count: i64,
    },

    #[error("{table}: row {row} is missing from the target")]
    MissingRow { table: String, row: String },

    #[error("{table}: row {row} column {column} differs (source {source_value:?}, target {target_value:?})")]
    Value {
        table: String,
        row: String,
        column: String,
        source_value: Option<String>,
        target_value: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, MigrateError>;
