// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Performance maps: one (problem size, performance) series per process count

use crate::selection::{Selection, distinct_sets};
use crate::series::{Reduction, XySeries, collect_series};
use crate::{Error, Result};
use duckdb::Connection;
use std::collections::BTreeMap;

/// Conventional name of the process count column in timing tables
pub const DEFAULT_PROCS_COLUMN: &str = "nProcs";

/// Series of one family of runs, keyed by process count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMap {
    pub series: BTreeMap<u64, XySeries>,
}

impl PerformanceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one (x, y) point to the series of `procs`
    #[must_use]
    pub fn with_point(mut self, procs: u64, x: f64, y: f64) -> Self {
        self.series.entry(procs).or_default().insert(x, vec![y]);
        self
    }

    #[must_use]
    pub fn get(&self, procs: u64) -> Option<&XySeries> {
        self.series.get(&procs)
    }

    pub fn process_counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.series.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Performance maps of every run family in a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceFamilies {
    /// Signature columns identifying one family
    pub id_fields: Vec<String>,
    pub maps: BTreeMap<Selection, PerformanceMap>,
}

impl PerformanceFamilies {
    #[must_use]
    pub fn get(&self, id: &Selection) -> Option<&PerformanceMap> {
        self.maps.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Every performance map in `table`.
///
/// Runs are told apart by `signature`, which must include `x_column`
/// (usually the problem size) and `procs_column`. For each run `y_column` is
/// reduced to one value; runs that only differ in `x_column` form a series
/// and series that only differ in `procs_column` form one map.
pub fn perfmap_series(
    conn: &Connection,
    table: &str,
    signature: &[&str],
    x_column: &str,
    y_column: &str,
    reduction: Reduction,
    constraint: Option<&str>,
    procs_column: &str,
) -> Result<PerformanceFamilies> {
    if signature.is_empty() || x_column.is_empty() || y_column.is_empty() {
        log::error!(
            "Cannot build performance maps of {table}: signature, x and y columns must be named"
        );
        return Ok(PerformanceFamilies::default());
    }

    let runs = distinct_sets(conn, table, signature, constraint)?;
    let collection = collect_series(conn, table, &runs, x_column, &[y_column], reduction)?;

    let mut families = PerformanceFamilies {
        id_fields: collection
            .id_fields
            .iter()
            .filter(|f| *f != procs_column)
            .cloned()
            .collect(),
        maps: BTreeMap::new(),
    };
    for (run, series) in collection.series {
        let procs_value = run.require(procs_column)?;
        let procs = procs_value
            .as_i64()
            .and_then(|p| u64::try_from(p).ok())
            .ok_or_else(|| Error::non_numeric(procs_column, procs_value))?;
        _ = families
            .maps
            .entry(run.without(procs_column))
            .or_default()
            .series
            .insert(procs, series);
    }

    log::info!(
        "Built {} performance maps of {y_column} over {x_column} from {} runs of {table}",
        families.len(),
        runs.len()
    );
    Ok(families)
}
