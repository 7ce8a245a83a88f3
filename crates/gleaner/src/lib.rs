// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Gleaner - ingestion, reduction and scaling analysis for simulation results
//!
//! Result files written by simulation runs (timing logs, tracking samples,
//! exported CSV slices) are collected into DuckDB tables whose schema grows
//! with every new header seen. On top of those tables the crate offers
//! column extraction, grouped spatial/radial averaging, run enumeration and
//! weak/strong scaling efficiency curves for plotting scripts.
//!
//! Every operation takes the [`Connection`] explicitly; nothing here holds a
//! shared connection.
//!
//! Set RUST_LOG environment variable to control logging:
//! - RUST_LOG=off (default) - silent
//! - RUST_LOG=info - ingestion and reduction summaries
//! - RUST_LOG=debug - per-file and per-query diagnostics
//! - RUST_LOG=gleaner=debug - debug only this crate

// Cell values exchanged with the store
pub mod value;

// Error types
pub mod error;

// Header parsing and row reading
pub mod dialect;
pub mod field;

// Table creation and schema evolution
pub mod schema;

// Loading files into tables
pub mod ingest;

// Reading tables back
pub mod columns;

// Derived tables
pub mod reduce;

// Run enumeration and series collection
pub mod selection;
pub mod series;

// Scaling analysis
pub mod perfmap;
pub mod scaling;

// YAML configuration
pub mod config;

pub use columns::{read_arrays, read_column, read_columns, read_f64_columns};
pub use config::{GleanerConfig, SourceConfig};
pub use dialect::{Delimiter, Dialect};
pub use error::{Error, Result};
pub use ingest::{
    IngestReport, connect_and_ingest, expand_pattern, ingest_dialect, ingest_file,
    ingest_patterns, open_database,
};
pub use perfmap::{PerformanceFamilies, PerformanceMap, perfmap_series};
pub use reduce::{radial_reduction, reduced_table_name, spatial_reduction, theta};
pub use scaling::{
    ScalingCurve, ScalingOptions, strong_efficiency, strong_scaling, weak_efficiency,
    weak_scaling,
};
pub use schema::{SqlType, TypeMap, ensure_columns, table_columns, table_exists};
pub use selection::{Selection, distinct_sets};
pub use series::{
    Reduction, SeriesCollection, XyPoint, XySeries, collect_series, median, number_set,
    reduced_values,
};
pub use value::FieldValue;

pub use duckdb::Connection;
