// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Table schemas and additive schema evolution
//!
//! Tables grow with the headers they see: a file introducing a column the
//! table lacks extends the table, rows already stored read NULL for it.
//! Columns are never dropped or retyped.

use crate::Result;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    /// DuckDB type name; REAL is single precision there, so reals are DOUBLE
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "BIGINT",
            SqlType::Real => "DOUBLE",
            SqlType::Text => "VARCHAR",
        }
    }
}

/// Column types of the timing logs written by the solvers
const TIMING_TYPES: &[(&str, SqlType)] = &[
    ("nProcs", SqlType::Integer),
    ("threads", SqlType::Integer),
    ("DomSize", SqlType::Integer),
    ("Dofs", SqlType::Integer),
    ("DofPE", SqlType::Integer),
    ("DofPEPV", SqlType::Integer),
    ("nVars", SqlType::Integer),
    ("KEUPS", SqlType::Real),
    ("KDUPS", SqlType::Real),
    ("MLUPs", SqlType::Real),
    ("maxIter", SqlType::Integer),
    ("ATELES", SqlType::Real),
    ("initialize", SqlType::Real),
    ("simLoop", SqlType::Real),
    ("commState", SqlType::Real),
    ("Output", SqlType::Real),
    ("preprocKern", SqlType::Real),
    ("projToFace", SqlType::Real),
    ("setBnd", SqlType::Real),
    ("invMassMat", SqlType::Real),
    ("numFlux", SqlType::Real),
    ("physFlux", SqlType::Real),
    ("projTestFun", SqlType::Real),
    ("invMassT", SqlType::Real),
    ("localProj", SqlType::Real),
    ("MemRSS", SqlType::Integer),
    ("MemHWM", SqlType::Integer),
];

/// Maps column names to declared types when tables are created or extended.
///
/// Names without an entry get the fallback type, or VARCHAR when there is
/// none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    fallback: Option<SqlType>,
    columns: HashMap<String, SqlType>,
}

impl TypeMap {
    /// Every column stored as text
    #[must_use]
    pub fn untyped() -> Self {
        Self::default()
    }

    /// Every column of the same type
    #[must_use]
    pub fn uniform(ty: SqlType) -> Self {
        Self {
            fallback: Some(ty),
            columns: HashMap::new(),
        }
    }

    /// Known timing columns typed, everything else text
    #[must_use]
    pub fn timing() -> Self {
        TIMING_TYPES
            .iter()
            .fold(Self::untyped(), |map, (name, ty)| map.with_column(*name, *ty))
    }

    #[must_use]
    pub fn with_column<S: Into<String>>(mut self, name: S, ty: SqlType) -> Self {
        _ = self.columns.insert(name.into(), ty);
        self
    }

    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<SqlType> {
        self.columns.get(name).copied().or(self.fallback)
    }

    /// `"name" TYPE` for one column
    #[must_use]
    pub fn column_def(&self, name: &str) -> String {
        let ty = self.type_of(name).unwrap_or(SqlType::Text);
        format!("{} {}", quote_ident(name), ty.as_sql())
    }

    /// Comma-joined column definitions for `CREATE TABLE`
    #[must_use]
    pub fn clause<S: AsRef<str>>(&self, fields: &[S]) -> String {
        fields
            .iter()
            .map(|f| self.column_def(f.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM information_schema.tables \
         WHERE table_catalog = current_database() AND table_schema = current_schema() \
         AND lower(table_name) = lower(?)",
        duckdb::params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of `table` in stored order; empty when the table is missing
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_catalog = current_database() AND table_schema = current_schema() \
         AND lower(table_name) = lower(?) \
         ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map(duckdb::params![table], |row| row.get::<_, String>(0))?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Drop `table` if present, returning whether it existed
pub fn drop_table_if_exists(conn: &Connection, table: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }
    log::warn!("Table {table} already exists, dropping and recreating");
    conn.execute_batch(&format!("DROP TABLE {}", quote_ident(table)))?;
    Ok(true)
}

/// Make sure `table` has every column in `fields`.
///
/// A missing table is created with exactly `fields`; an existing one gets the
/// missing fields appended in the order given. Returns the table's columns
/// after evolution.
pub fn ensure_columns<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    fields: &[S],
    types: &TypeMap,
) -> Result<Vec<String>> {
    if !table_exists(conn, table)? {
        let sql = format!("CREATE TABLE {} ({})", quote_ident(table), types.clause(fields));
        log::debug!("SQL: {sql}");
        conn.execute_batch(&sql)?;
        log::info!("Created table {table} with {} columns", fields.len());
        return table_columns(conn, table);
    }

    let mut known = table_columns(conn, table)?;
    for field in fields.iter().map(AsRef::as_ref) {
        if known.iter().any(|c| c.eq_ignore_ascii_case(field)) {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(table),
            types.column_def(field)
        );
        log::debug!("SQL: {sql}");
        conn.execute_batch(&sql)?;
        log::info!("Added column {field} to table {table}");
        known.push(field.to_string());
    }
    table_columns(conn, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_uses_type_map() {
        let map = TypeMap::timing();
        assert_eq!(
            map.clause(&["nProcs", "simLoop", "revision"]),
            "\"nProcs\" BIGINT, \"simLoop\" DOUBLE, \"revision\" VARCHAR"
        );
        assert_eq!(
            TypeMap::uniform(SqlType::Real).column_def("coordX"),
            "\"coordX\" DOUBLE"
        );
        assert_eq!(
            TypeMap::untyped()
                .with_column("n", SqlType::Integer)
                .clause(&["n", "label"]),
            "\"n\" BIGINT, \"label\" VARCHAR"
        );
    }

    #[test]
    fn test_create_then_evolve_additively() {
        let conn = Connection::open_in_memory().unwrap();
        let types = TypeMap::uniform(SqlType::Real);

        assert!(!table_exists(&conn, "probe").unwrap());
        let cols = ensure_columns(&conn, "probe", &["t", "rho"], &types).unwrap();
        assert_eq!(cols, vec!["t", "rho"]);
        assert!(table_exists(&conn, "probe").unwrap());

        // Same fields again: unchanged
        let cols = ensure_columns(&conn, "probe", &["rho", "t"], &types).unwrap();
        assert_eq!(cols, vec!["t", "rho"]);

        // Superset: new fields appended in first-seen order
        let cols = ensure_columns(&conn, "probe", &["p", "t", "u", "rho"], &types).unwrap();
        assert_eq!(cols, vec!["t", "rho", "p", "u"]);
    }

    #[test]
    fn test_evolution_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let types = TypeMap::uniform(SqlType::Real);
        ensure_columns(&conn, "probe", &["t"], &types).unwrap();
        conn.execute_batch("INSERT INTO probe VALUES (1.0), (2.0)")
            .unwrap();
        ensure_columns(&conn, "probe", &["t", "rho"], &types).unwrap();

        let (rows, nulls): (i64, i64) = conn
            .query_row(
                "SELECT count(*), count(*) FILTER (WHERE rho IS NULL) FROM probe",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((rows, nulls), (2, 2));
    }

    #[test]
    fn test_drop_table_if_exists() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!drop_table_if_exists(&conn, "probe_red").unwrap());
        ensure_columns(&conn, "probe_red", &["theta"], &TypeMap::untyped()).unwrap();
        assert!(drop_table_if_exists(&conn, "probe_red").unwrap());
        assert!(!table_exists(&conn, "probe_red").unwrap());
    }
}
