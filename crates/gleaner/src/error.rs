// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for ingestion and analysis
use std::path::{Path, PathBuf};

/// Gleaner error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DuckDB error
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Arrow conversion error
    #[error("Arrow error: {0}")]
    Arrow(#[from] duckdb::arrow::error::ArrowError),

    /// Delimited file parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error on a result or configuration file
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    /// Configuration that parses but fails validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Glob pattern that cannot be parsed or walked
    #[error("Invalid file pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    /// File shorter than its header
    #[error("Missing header row {row} in {path}")]
    MissingHeader { path: PathBuf, row: usize },

    /// Header token without a leading word
    #[error("Invalid field name {token:?}: no leading word characters")]
    InvalidFieldName { token: String },

    /// Data row whose width differs from the header
    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    RowWidth {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Cell that must be a number but is not
    #[error("Column {column} holds non-numeric value {value:?}")]
    NonNumeric { column: String, value: String },

    /// Selection lookup of an absent field
    #[error("Selection has no field {column}")]
    MissingField { column: String },

    /// Reduction over no values
    #[error("No values in column {column} for selection ({selection})")]
    EmptyReduction { column: String, selection: String },

    /// A derived table would hold the same column twice
    #[error("Column {column} is reserved in {table}")]
    ReservedColumn { column: String, table: String },

    /// Reduction name other than median, min, max or mean
    #[error("Unknown reduction {0:?}, expected one of median, min, max, mean")]
    UnknownReduction(String),
}

impl Error {
    pub(crate) fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn non_numeric<S: Into<String>>(column: S, value: &crate::FieldValue) -> Self {
        Error::NonNumeric {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

/// Result type for gleaner operations
pub type Result<T> = std::result::Result<T, Error>;
