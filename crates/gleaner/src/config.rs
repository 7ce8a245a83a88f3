// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! YAML description of what to ingest where
//!
//! ```yaml
//! database: results.duckdb
//! sources:
//!   - table: timing
//!     dialect: timing
//!     patterns: ["runs/*/timing.res"]
//!     types: { DomSize: INTEGER }
//! ```
//!
//! Relative paths and patterns are taken relative to the working directory.

use crate::dialect::Dialect;
use crate::ingest::{IngestReport, ingest_matches, open_database};
use crate::schema::{SqlType, TypeMap};
use crate::{Error, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GleanerConfig {
    /// Database file, or `:memory:`
    pub database: PathBuf,
    pub sources: Vec<SourceConfig>,
}

/// Files of one dialect loaded into one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub table: String,
    pub dialect: Dialect,
    pub patterns: Vec<String>,
    /// Column types overriding the dialect's
    #[serde(default)]
    pub types: BTreeMap<String, SqlType>,
    /// Rows in front of the data, overriding the dialect's
    #[serde(default)]
    pub skip_rows: Option<usize>,
}

impl GleanerConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: GleanerConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_yaml(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one source must be configured".to_string(),
            ));
        }
        for source in &self.sources {
            if source.table.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "source table name cannot be empty".to_string(),
                ));
            }
            if source.patterns.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "source {} lists no file patterns",
                    source.table
                )));
            }
        }
        Ok(())
    }

    /// Open the database and ingest every source in order
    pub fn ingest(&self) -> Result<Connection> {
        let mut conn = open_database(&self.database)?;
        for source in &self.sources {
            _ = source.ingest(&mut conn)?;
        }
        Ok(conn)
    }
}

impl SourceConfig {
    /// The dialect's types with the configured overrides applied
    #[must_use]
    pub fn type_map(&self) -> TypeMap {
        self.types
            .iter()
            .fold(self.dialect.type_map(), |map, (name, ty)| {
                map.with_column(name.as_str(), *ty)
            })
    }

    /// Append every matched file to the source's table
    pub fn ingest(&self, conn: &mut Connection) -> Result<IngestReport> {
        let skip_rows = self.skip_rows.unwrap_or(self.dialect.skip_rows());
        ingest_matches(
            conn,
            &self.patterns,
            &self.table,
            self.dialect,
            &self.type_map(),
            skip_rows,
        )
    }
}
