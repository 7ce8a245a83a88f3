// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Loading result files into tables
//!
//! Every file is read against the field identifiers of its own header, the
//! target table is extended to cover them, and the rows are inserted as raw
//! strings inside one transaction per file. DuckDB casts each value to the
//! declared column type on insert.

use crate::dialect::{Delimiter, Dialect, RowReader};
use crate::schema::{TypeMap, ensure_columns, quote_ident};
use crate::{Error, Result};
use duckdb::Connection;
use std::path::{Path, PathBuf};
use wax::Glob;

/// Summary of a multi-file ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files read
    pub files: usize,
    /// Rows inserted over all files
    pub rows: usize,
    /// Table columns after the last file
    pub columns: Vec<String>,
}

/// Open a database file, or an in-memory store for `:memory:`
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = if path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    log::debug!("Opened database {}", path.display());
    Ok(conn)
}

/// Append the rows of `path` to `table`.
///
/// `fields` names the values of every row positionally; the first
/// `skip_rows` non-blank rows are skipped. A row with a different number of
/// values fails the whole file before anything is committed.
pub fn ingest_file<P: AsRef<Path>>(
    conn: &mut Connection,
    table: &str,
    path: P,
    fields: &[String],
    skip_rows: usize,
    delimiter: Delimiter,
    types: &TypeMap,
) -> Result<usize> {
    let path = path.as_ref();
    _ = ensure_columns(conn, table, fields, types)?;

    let mut rows = RowReader::open(path, delimiter)?;
    rows.skip_records(skip_rows)?;

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", "),
        vec!["?"; fields.len()].join(", ")
    );
    log::debug!("SQL: {sql}");

    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for record in rows {
            let record = record?;
            if record.values.len() != fields.len() {
                return Err(Error::RowWidth {
                    path: path.to_path_buf(),
                    line: record.line,
                    expected: fields.len(),
                    found: record.values.len(),
                });
            }
            _ = stmt.execute(duckdb::params_from_iter(record.values))?;
            inserted += 1;
        }
    }
    tx.commit()?;

    log::info!(
        "Ingested {inserted} rows from {} into {table}",
        path.display()
    );
    Ok(inserted)
}

/// Read the header of `path` in `dialect` and append its rows to `table`
pub fn ingest_dialect<P: AsRef<Path>>(
    conn: &mut Connection,
    table: &str,
    path: P,
    dialect: Dialect,
    types: &TypeMap,
) -> Result<usize> {
    let path = path.as_ref();
    let fields = dialect.read_header(path)?;
    ingest_file(
        conn,
        table,
        path,
        &fields,
        dialect.skip_rows(),
        dialect.delimiter(),
        types,
    )
}

fn has_glob_syntax(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{', '<'])
}

/// Files matching `pattern`, sorted.
///
/// A pattern without wildcards names one file, which must exist.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    if !has_glob_syntax(pattern) {
        let path = PathBuf::from(pattern);
        _ = std::fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        return Ok(vec![path]);
    }

    let invalid = |message: String| Error::Pattern {
        pattern: pattern.to_string(),
        message,
    };
    let (prefix, glob) = Glob::new(pattern)
        .map_err(|e| invalid(e.to_string()))?
        .partition();
    if glob.has_semantic_literals() {
        return Err(invalid("'.' and '..' components are not supported".to_string()));
    }
    let root = if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    };

    let mut paths = Vec::new();
    for entry in glob.walk(root) {
        let entry = entry.map_err(|e| invalid(e.to_string()))?;
        let path = entry.path();
        let md = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if md.is_file() {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    if paths.is_empty() {
        log::warn!("No files match {pattern}");
    }
    Ok(paths)
}

/// Append every file matched by `patterns` to `table`
pub fn ingest_patterns<S: AsRef<str>>(
    conn: &mut Connection,
    patterns: &[S],
    table: &str,
    dialect: Dialect,
    types: &TypeMap,
) -> Result<IngestReport> {
    ingest_matches(conn, patterns, table, dialect, types, dialect.skip_rows())
}

pub(crate) fn ingest_matches<S: AsRef<str>>(
    conn: &mut Connection,
    patterns: &[S],
    table: &str,
    dialect: Dialect,
    types: &TypeMap,
    skip_rows: usize,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for pattern in patterns {
        for path in expand_pattern(pattern.as_ref())? {
            let fields = dialect.read_header(&path)?;
            report.rows += ingest_file(
                conn,
                table,
                &path,
                &fields,
                skip_rows,
                dialect.delimiter(),
                types,
            )?;
            report.files += 1;
        }
    }
    report.columns = crate::schema::table_columns(conn, table)?;
    log::info!(
        "Ingested {} {dialect} files ({} rows) into {table}",
        report.files,
        report.rows
    );
    Ok(report)
}

/// Open `db_path` and append every file matched by `patterns` to `table`
pub fn connect_and_ingest<S: AsRef<str>, P: AsRef<Path>>(
    patterns: &[S],
    db_path: P,
    table: &str,
    dialect: Dialect,
) -> Result<Connection> {
    let mut conn = open_database(db_path)?;
    _ = ingest_patterns(&mut conn, patterns, table, dialect, &dialect.type_map())?;
    Ok(conn)
}
