// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Run enumeration
//!
//! A run of a parametrized experiment is identified by the values of a set
//! of signature columns. [`distinct_sets`] finds every combination of those
//! values that actually co-occurs in a table.

use crate::schema::quote_ident;
use crate::{Error, FieldValue, Result};
use duckdb::Connection;
use std::fmt;

/// One distinct run: signature column names paired with matched values.
///
/// Fields keep signature order. Selections are compared, hashed and ordered
/// field by field, so they work as map keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selection {
    fields: Vec<(String, FieldValue)>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, replacing the value of an existing field of that name
    #[must_use]
    pub fn with<S: Into<String>, V: Into<FieldValue>>(mut self, column: S, value: V) -> Self {
        self.push(column, value);
        self
    }

    pub(crate) fn push<S: Into<String>, V: Into<FieldValue>>(&mut self, column: S, value: V) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find_map(|(c, v)| (c == column).then_some(v))
    }

    /// Value of `column`, or `Error::MissingField`
    pub fn require(&self, column: &str) -> Result<&FieldValue> {
        self.get(column).ok_or_else(|| Error::MissingField {
            column: column.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this selection without `column`
    #[must_use]
    pub fn without(&self, column: &str) -> Selection {
        Selection {
            fields: self
                .fields
                .iter()
                .filter(|(c, _)| c != column)
                .cloned()
                .collect(),
        }
    }

    /// WHERE clause matching exactly this selection
    pub(crate) fn filter(&self) -> Filter {
        self.iter()
            .fold(Filter::new(None), |filter, (c, v)| filter.and(c, v.clone()))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (column, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{column}={value}")?;
        }
        Ok(())
    }
}

/// A conjunction of an optional free-form constraint and `column = value`
/// terms, rendered with bound parameters
#[derive(Debug, Clone, Default)]
pub(crate) struct Filter {
    constraint: Option<String>,
    terms: Vec<(String, FieldValue)>,
}

impl Filter {
    pub(crate) fn new(constraint: Option<&str>) -> Self {
        Self {
            constraint: constraint
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            terms: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn and<S: Into<String>>(mut self, column: S, value: FieldValue) -> Self {
        self.terms.push((column.into(), value));
        self
    }

    /// ` WHERE …` (or nothing) and the parameters it binds
    pub(crate) fn clause(&self) -> (String, Vec<FieldValue>) {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        if let Some(constraint) = &self.constraint {
            parts.push(format!("({constraint})"));
        }
        for (column, value) in &self.terms {
            if value.is_null() {
                parts.push(format!("{} IS NULL", quote_ident(column)));
            } else {
                parts.push(format!("{} = ?", quote_ident(column)));
                params.push(value.clone());
            }
        }
        if parts.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", parts.join(" AND ")), params)
        }
    }
}

fn distinct_values(
    conn: &Connection,
    table: &str,
    column: &str,
    filter: &Filter,
) -> Result<Vec<FieldValue>> {
    let (clause, params) = filter.clause();
    let sql = format!(
        "SELECT DISTINCT {col} FROM {} {clause} ORDER BY {col}",
        quote_ident(table),
        col = quote_ident(column),
    );
    log::debug!("SQL: {sql}");
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map(duckdb::params_from_iter(params), |row| row.get::<_, FieldValue>(0))?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(values)
}

fn enumerate(
    conn: &Connection,
    table: &str,
    signature: &[&str],
    filter: Filter,
) -> Result<Vec<Selection>> {
    let Some((column, rest)) = signature.split_last() else {
        return Ok(vec![Selection::new()]);
    };

    let mut sets = Vec::new();
    for value in distinct_values(conn, table, column, &filter)? {
        let child_filter = filter.clone().and(*column, value.clone());
        for mut child in enumerate(conn, table, rest, child_filter)? {
            child.push(*column, value.clone());
            sets.push(child);
        }
    }
    Ok(sets)
}

/// Every combination of `signature` values present in `table`.
///
/// `constraint` is an SQL boolean expression restricting the rows
/// considered. Each returned selection lists the signature columns in order.
/// An empty signature enumerates nothing.
pub fn distinct_sets(
    conn: &Connection,
    table: &str,
    signature: &[&str],
    constraint: Option<&str>,
) -> Result<Vec<Selection>> {
    if signature.is_empty() {
        log::error!("Cannot enumerate runs of {table}: signature is empty");
        return Ok(Vec::new());
    }
    let sets = enumerate(conn, table, signature, Filter::new(constraint))?;
    log::debug!(
        "Found {} distinct sets of ({}) in {table}",
        sets.len(),
        signature.join(", ")
    );
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE timing (revision VARCHAR, casename VARCHAR, nProcs BIGINT, KDUPS DOUBLE);
             INSERT INTO timing VALUES
               ('r1', 'cube', 24, 1.0), ('r1', 'cube', 24, 1.2),
               ('r1', 'cube', 48, 2.0),
               ('r1', 'pipe', 24, 3.0),
               ('r2', 'cube', 24, 4.0),
               ('r2', NULL, 48, 5.0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_only_cooccurring_combinations() {
        let conn = runs();
        let sets =
            distinct_sets(&conn, "timing", &["revision", "casename", "nProcs"], None).unwrap();
        assert_eq!(sets.len(), 5);

        let first = &sets[0];
        assert_eq!(
            first.columns().collect::<Vec<_>>(),
            vec!["revision", "casename", "nProcs"]
        );
        assert!(sets.contains(
            &Selection::new()
                .with("revision", "r1")
                .with("casename", "pipe")
                .with("nProcs", 24_i64)
        ));
        // NULL takes part through IS NULL
        assert!(sets.contains(
            &Selection::new()
                .with("revision", "r2")
                .with("casename", FieldValue::Null)
                .with("nProcs", 48_i64)
        ));
    }

    #[test]
    fn test_constraint_restricts_rows() {
        let conn = runs();
        let sets = distinct_sets(
            &conn,
            "timing",
            &["casename", "nProcs"],
            Some("revision = 'r1'"),
        )
        .unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|s| s.get("revision").is_none()));
    }

    #[test]
    fn test_empty_signature() {
        let conn = runs();
        assert!(distinct_sets(&conn, "timing", &[], None).unwrap().is_empty());
    }

    #[test]
    fn test_selection_helpers() {
        let sel = Selection::new().with("casename", "cube").with("nProcs", 24_i64);
        assert_eq!(sel.to_string(), "casename=cube, nProcs=24");
        assert_eq!(sel.without("nProcs"), Selection::new().with("casename", "cube"));
        assert!(matches!(sel.require("DomSize"), Err(Error::MissingField { .. })));

        let (clause, params) = sel.filter().clause();
        assert_eq!(clause, " WHERE \"casename\" = ? AND \"nProcs\" = ?");
        assert_eq!(params.len(), 2);

        let (clause, params) = Filter::new(Some(" ")).and("x", FieldValue::Null).clause();
        assert_eq!(clause, " WHERE \"x\" IS NULL");
        assert!(params.is_empty());
    }
}
