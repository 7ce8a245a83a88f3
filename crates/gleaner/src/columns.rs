// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Reading columns back out of a table
//!
//! All requested columns come from a single scan ordered by `rowid`, so the
//! i-th entry of every returned column belongs to the same row and rows
//! appear in insertion order.

use crate::schema::quote_ident;
use crate::{Error, FieldValue, Result};
use duckdb::Connection;
use duckdb::arrow::array::{Array, ArrayRef, Float64Array};
use duckdb::arrow::compute::{CastOptions, cast_with_options, concat};
use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::record_batch::RecordBatch;

fn select_sql<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY rowid",
        columns
            .iter()
            .map(|c| quote_ident(c.as_ref()))
            .collect::<Vec<_>>()
            .join(", "),
        quote_ident(table)
    )
}

/// Every requested column as a vector of cells, row-aligned
pub fn read_columns<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    columns: &[S],
) -> Result<Vec<Vec<FieldValue>>> {
    let mut result: Vec<Vec<FieldValue>> = vec![Vec::new(); columns.len()];
    if columns.is_empty() {
        return Ok(result);
    }

    let sql = select_sql(table, columns);
    log::debug!("SQL: {sql}");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (idx, column) in result.iter_mut().enumerate() {
            column.push(row.get(idx)?);
        }
    }
    Ok(result)
}

/// One column as a vector of cells
pub fn read_column(conn: &Connection, table: &str, column: &str) -> Result<Vec<FieldValue>> {
    Ok(read_columns(conn, table, &[column])?
        .pop()
        .unwrap_or_default())
}

/// Every requested column as numbers; NULL or text that is not a number fails
pub fn read_f64_columns<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    columns: &[S],
) -> Result<Vec<Vec<f64>>> {
    read_columns(conn, table, columns)?
        .into_iter()
        .zip(columns)
        .map(|(values, name)| {
            values
                .iter()
                .map(|v| v.as_f64().ok_or_else(|| Error::non_numeric(name.as_ref(), v)))
                .collect()
        })
        .collect()
}

/// Every requested column as an Arrow `Float64Array`.
///
/// Values go through a strict Arrow cast: NULLs stay null and text that is
/// not a number fails with [`Error::Arrow`].
pub fn read_arrays<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    columns: &[S],
) -> Result<Vec<Float64Array>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let sql = select_sql(table, columns);
    log::debug!("SQL: {sql}");
    let mut stmt = conn.prepare(&sql)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };

    (0..columns.len())
        .map(|idx| -> Result<Float64Array> {
            let parts = batches
                .iter()
                .map(|batch| cast_with_options(batch.column(idx), &DataType::Float64, &options))
                .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
            if parts.is_empty() {
                return Ok(Float64Array::from(Vec::<f64>::new()));
            }
            let refs: Vec<&dyn Array> = parts.iter().map(|a| a.as_ref()).collect();
            let joined = concat(&refs)?;
            Ok(joined
                .as_any()
                .downcast_ref::<Float64Array>()
                .cloned()
                .unwrap_or_else(|| Float64Array::from(Vec::<f64>::new())))
        })
        .collect()
}
