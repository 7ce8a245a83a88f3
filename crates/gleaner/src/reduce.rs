// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Grouped averaging into derived tables
//!
//! Samples taken on a grid are collapsed onto one coordinate: every row is
//! keyed by its coordinate value (or by its angle around a reference point
//! for the radial variant) and each requested column is replaced by its mean
//! over the rows sharing a key. The result replaces `<table>_red`.
//!
//! Keys compare with exact floating-point equality, so coordinates that only
//! differ by rounding noise end up in separate groups.

use crate::columns::read_columns;
use crate::schema::{SqlType, TypeMap, drop_table_if_exists, ensure_columns, quote_ident};
use crate::{Error, FieldValue, Result};
use duckdb::Connection;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Suffix of derived tables
pub const REDUCED_SUFFIX: &str = "_red";

/// Column holding the angle in radial reductions
pub const THETA_COLUMN: &str = "theta";

#[must_use]
pub fn reduced_table_name(table: &str) -> String {
    format!("{table}{REDUCED_SUFFIX}")
}

/// Angle in degrees of `(x, y)` around `reference`, measured so that the
/// positive x direction is 180 and the positive y direction is 90.
#[must_use]
pub fn theta(x: f64, y: f64, reference: (f64, f64)) -> f64 {
    180.0 - (y - reference.1).atan2(x - reference.0) * 180.0 / PI
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Per-key means, keys kept in order of first appearance
struct GroupedMeans {
    keys: Vec<FieldValue>,
    index: HashMap<FieldValue, usize>,
    means: Vec<Vec<Mean>>,
    width: usize,
}

impl GroupedMeans {
    fn new(width: usize) -> Self {
        Self {
            keys: Vec::new(),
            index: HashMap::new(),
            means: Vec::new(),
            width,
        }
    }

    fn group(&mut self, key: FieldValue) -> &mut [Mean] {
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                let idx = self.keys.len();
                _ = self.index.insert(key.clone(), idx);
                self.keys.push(key);
                self.means.push(vec![Mean::default(); self.width]);
                idx
            }
        };
        &mut self.means[idx]
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn into_rows(self) -> impl Iterator<Item = Vec<FieldValue>> {
        self.keys.into_iter().zip(self.means).map(|(key, means)| {
            std::iter::once(key)
                .chain(means.into_iter().map(|m| FieldValue::from(m.value())))
                .collect()
        })
    }
}

/// Columns to average in request order, each once, leaving out `exclude`
fn averaged_columns<'a, S: AsRef<str>>(columns: &'a [S], exclude: &[&str]) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for name in columns.iter().map(AsRef::as_ref) {
        if !exclude.contains(&name) && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Accumulate row `row` of every value column into `group`
fn accumulate(
    group: &mut [Mean],
    names: &[&str],
    values: &[Vec<FieldValue>],
    row: usize,
) -> Result<()> {
    for ((mean, name), column) in group.iter_mut().zip(names).zip(values) {
        let cell = &column[row];
        if cell.is_null() {
            continue;
        }
        mean.add(cell.as_f64().ok_or_else(|| Error::non_numeric(*name, cell))?);
    }
    Ok(())
}

/// Replace `<table>_red` with the means of `columns` grouped by `coord`.
///
/// The derived table has the coordinate first, then one column per averaged
/// column (repeats collapsed), all REAL. NULL cells are left out of a mean; a group without any
/// value gets NULL. Returns the number of groups written.
pub fn spatial_reduction<S: AsRef<str>>(
    conn: &mut Connection,
    table: &str,
    columns: &[S],
    coord: &str,
) -> Result<usize> {
    let names = averaged_columns(columns, &[coord]);
    let fields: Vec<&str> = std::iter::once(coord).chain(names.iter().copied()).collect();
    let mut values = read_columns(conn, table, &fields)?;
    let keys = values.remove(0);

    let mut groups = GroupedMeans::new(names.len());
    for (row, key) in keys.into_iter().enumerate() {
        accumulate(groups.group(key), &names, &values, row)?;
    }

    let target = reduced_table_name(table);
    log::info!(
        "Reducing {table} over {coord}: {} groups into {target}",
        groups.len()
    );
    write_reduced(conn, &target, coord, &names, groups)
}

/// Replace `<table>_red` with the means of `columns` grouped by angle around
/// `reference`.
///
/// `coords` names the x and y columns; they are never averaged themselves.
/// A column named `theta` cannot be averaged since the angle takes its name.
/// The derived table holds `theta` and one column per averaged column, rows
/// in order of first appearance of each angle. Returns the number of groups
/// written.
pub fn radial_reduction<S: AsRef<str>>(
    conn: &mut Connection,
    table: &str,
    columns: &[S],
    coords: (&str, &str),
    reference: (f64, f64),
) -> Result<usize> {
    let (x_col, y_col) = coords;
    let names = averaged_columns(columns, &[x_col, y_col]);
    if names.contains(&THETA_COLUMN) {
        return Err(Error::ReservedColumn {
            column: THETA_COLUMN.to_string(),
            table: reduced_table_name(table),
        });
    }
    let fields: Vec<&str> = [x_col, y_col]
        .into_iter()
        .chain(names.iter().copied())
        .collect();
    let mut values = read_columns(conn, table, &fields)?;
    let ys = values.remove(1);
    let xs = values.remove(0);

    let mut groups = GroupedMeans::new(names.len());
    for (row, (x, y)) in xs.iter().zip(&ys).enumerate() {
        let x = x.as_f64().ok_or_else(|| Error::non_numeric(x_col, x))?;
        let y = y.as_f64().ok_or_else(|| Error::non_numeric(y_col, y))?;
        let key = FieldValue::Real(theta(x, y, reference));
        accumulate(groups.group(key), &names, &values, row)?;
    }

    let target = reduced_table_name(table);
    log::info!(
        "Reducing {table} radially around ({}, {}): {} groups into {target}",
        reference.0,
        reference.1,
        groups.len()
    );
    write_reduced(conn, &target, THETA_COLUMN, &names, groups)
}

fn write_reduced(
    conn: &mut Connection,
    target: &str,
    key_column: &str,
    names: &[&str],
    groups: GroupedMeans,
) -> Result<usize> {
    let fields: Vec<&str> = std::iter::once(key_column)
        .chain(names.iter().copied())
        .collect();

    _ = drop_table_if_exists(conn, target)?;
    _ = ensure_columns(conn, target, &fields, &TypeMap::uniform(SqlType::Real))?;

    let sql = format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(target),
        vec!["?"; fields.len()].join(", ")
    );
    let count = groups.len();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for row in groups.into_rows() {
            _ = stmt.execute(duckdb::params_from_iter(row))?;
        }
    }
    tx.commit()?;
    Ok(count)
}
