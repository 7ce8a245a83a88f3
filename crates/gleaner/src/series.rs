// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-run values and (x, y) series
//!
//! Repeated measurements of one run are collapsed with a [`Reduction`], then
//! runs sharing every signature field except the x column are laid out as one
//! [`XySeries`] sorted by x.

use crate::schema::quote_ident;
use crate::selection::Selection;
use crate::{Error, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// How repeated measurements collapse to one value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Median,
    Min,
    Max,
    Mean,
}

impl Reduction {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Reduction::Median => "median",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Mean => "mean",
        }
    }

    /// Reduce ascending `sorted`; `None` when it is empty
    #[must_use]
    pub fn apply(self, sorted: &[f64]) -> Option<f64> {
        match self {
            Reduction::Median => median(sorted),
            Reduction::Min => sorted.first().copied(),
            Reduction::Max => sorted.last().copied(),
            Reduction::Mean => (!sorted.is_empty())
                .then(|| sorted.iter().sum::<f64>() / sorted.len() as f64),
        }
    }
}

impl FromStr for Reduction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "median" => Ok(Reduction::Median),
            "min" => Ok(Reduction::Min),
            "max" => Ok(Reduction::Max),
            "mean" => Ok(Reduction::Mean),
            other => Err(Error::UnknownReduction(other.to_string())),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Median of ascending `sorted`; the mean of the middle pair for even
/// lengths, `None` when empty.
#[must_use]
pub fn median(sorted: &[f64]) -> Option<f64> {
    let half = sorted.len() / 2;
    match sorted.len() {
        0 => None,
        n if n % 2 == 0 => Some(0.5 * (sorted[half - 1] + sorted[half])),
        _ => Some(sorted[half]),
    }
}

/// Values of `column` in the rows matching `selection`, ascending.
///
/// NULL cells are skipped; any other non-numeric cell fails.
pub fn number_set(
    conn: &Connection,
    table: &str,
    selection: &Selection,
    column: &str,
) -> Result<Vec<f64>> {
    let (clause, params) = selection.filter().clause();
    let sql = format!(
        "SELECT {} FROM {}{clause}",
        quote_ident(column),
        quote_ident(table)
    );
    log::debug!("SQL: {sql}");
    let mut stmt = conn.prepare(&sql)?;
    let cells = stmt
        .query_map(duckdb::params_from_iter(params), |row| {
            row.get::<_, crate::FieldValue>(0)
        })?
        .collect::<duckdb::Result<Vec<_>>>()?;

    let mut values = cells
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.as_f64().ok_or_else(|| Error::non_numeric(column, v)))
        .collect::<Result<Vec<f64>>>()?;
    values.sort_by(f64::total_cmp);
    Ok(values)
}

/// One reduced value per column for the rows matching `selection`
pub fn reduced_values<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    selection: &Selection,
    columns: &[S],
    reduction: Reduction,
) -> Result<Vec<f64>> {
    columns
        .iter()
        .map(|column| {
            let column = column.as_ref();
            let values = number_set(conn, table, selection, column)?;
            reduction
                .apply(&values)
                .ok_or_else(|| Error::EmptyReduction {
                    column: column.to_string(),
                    selection: selection.to_string(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct XyPoint {
    pub x: f64,
    pub y: Vec<f64>,
}

/// Points ordered by x; points with equal x keep insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XySeries {
    points: Vec<XyPoint>,
}

impl XySeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every point with x not greater than `x`
    pub fn insert(&mut self, x: f64, y: Vec<f64>) {
        let pos = self.points.partition_point(|p| p.x <= x);
        self.points.insert(pos, XyPoint { x, y });
    }

    #[must_use]
    pub fn points(&self) -> &[XyPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.x)
    }

    /// y at `x`, linearly interpolated between the nearest neighbours.
    ///
    /// `None` outside the x range of the series. Never extrapolates.
    #[must_use]
    pub fn value_at(&self, x: f64) -> Option<Vec<f64>> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        if x < first.x || x > last.x {
            return None;
        }
        if self.points.len() == 1 {
            return Some(first.y.clone());
        }

        let right = self
            .points
            .partition_point(|p| p.x <= x)
            .clamp(1, self.points.len() - 1);
        let (left, right) = (&self.points[right - 1], &self.points[right]);
        let span = right.x - left.x;
        if span == 0.0 {
            return Some(left.y.clone());
        }
        Some(
            left.y
                .iter()
                .zip(&right.y)
                .map(|(yl, yr)| yl + (yr - yl) / span * (x - left.x))
                .collect(),
        )
    }

    /// y of the last point whose x equals `x`
    #[must_use]
    pub fn exact_at(&self, x: f64) -> Option<&[f64]> {
        self.points
            .iter()
            .rev()
            .find(|p| p.x == x)
            .map(|p| p.y.as_slice())
    }

    /// Plain-text table: a header naming the columns, then one line per point.
    ///
    /// With `gnuplot` the header is written as a `# ` comment.
    pub fn write_to<W: Write, S: AsRef<str>>(
        &self,
        mut writer: W,
        x_name: &str,
        y_names: &[S],
        gnuplot: bool,
    ) -> std::io::Result<()> {
        if gnuplot {
            write!(writer, "# ")?;
        }
        write!(writer, "{x_name}")?;
        for name in y_names {
            write!(writer, " {}", name.as_ref())?;
        }
        writeln!(writer)?;

        for point in &self.points {
            write!(writer, "{}", point.x)?;
            for y in &point.y {
                write!(writer, " {y}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Series of several runs, keyed by their signature without the x column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesCollection {
    /// Signature columns identifying one series
    pub id_fields: Vec<String>,
    pub series: BTreeMap<Selection, XySeries>,
}

impl SeriesCollection {
    #[must_use]
    pub fn get(&self, id: &Selection) -> Option<&XySeries> {
        self.series.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Reduce `y_columns` for every selection and lay the values out over the
/// selection's `x_column` value.
pub fn collect_series<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    selections: &[Selection],
    x_column: &str,
    y_columns: &[S],
    reduction: Reduction,
) -> Result<SeriesCollection> {
    let mut collection = SeriesCollection {
        id_fields: selections
            .first()
            .map(|s| {
                s.columns()
                    .filter(|c| *c != x_column)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        series: BTreeMap::new(),
    };

    for selection in selections {
        let x_value = selection.require(x_column)?;
        let x = x_value
            .as_f64()
            .ok_or_else(|| Error::non_numeric(x_column, x_value))?;
        let y = reduced_values(conn, table, selection, y_columns, reduction)?;
        collection
            .series
            .entry(selection.without(x_column))
            .or_default()
            .insert(x, y);
    }

    log::debug!(
        "Collected {} series over {x_column} from {} runs of {table}",
        collection.len(),
        selections.len()
    );
    Ok(collection)
}
