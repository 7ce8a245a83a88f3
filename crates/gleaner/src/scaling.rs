// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Weak and strong scaling curves
//!
//! A curve has one point per process count of a [`PerformanceMap`] within
//! the node range. Its value is the performance of that process count at a
//! target problem size: `nodes * size_per_node` for weak scaling, a fixed
//! total size for strong scaling. Targets outside the measured sizes are
//! skipped, never extrapolated.

use crate::perfmap::PerformanceMap;
use crate::series::XySeries;
use serde::{Deserialize, Serialize};

/// `(nodes, value)` points ordered by node count
pub type ScalingCurve = Vec<(f64, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingOptions {
    /// Processes per node; 0 counts as 1
    #[serde(default = "default_ppn")]
    pub ppn: u32,
    #[serde(default)]
    pub min_nodes: Option<u32>,
    #[serde(default)]
    pub max_nodes: Option<u32>,
    /// Interpolate between measured sizes, otherwise require an exact match
    #[serde(default = "default_interpolate")]
    pub interpolate: bool,
}

fn default_ppn() -> u32 {
    1
}

fn default_interpolate() -> bool {
    true
}

impl Default for ScalingOptions {
    fn default() -> Self {
        Self {
            ppn: default_ppn(),
            min_nodes: None,
            max_nodes: None,
            interpolate: default_interpolate(),
        }
    }
}

impl ScalingOptions {
    #[must_use]
    pub fn with_ppn(mut self, ppn: u32) -> Self {
        self.ppn = ppn;
        self
    }

    #[must_use]
    pub fn with_node_range(mut self, min_nodes: Option<u32>, max_nodes: Option<u32>) -> Self {
        self.min_nodes = min_nodes;
        self.max_nodes = max_nodes;
        self
    }

    #[must_use]
    pub fn with_interpolation(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    fn ppn(&self) -> u64 {
        u64::from(self.ppn.max(1))
    }

    /// Inclusive process count range, clipped to what `perfmap` holds
    fn procs_range(&self, perfmap: &PerformanceMap) -> Option<(u64, u64)> {
        let first = *perfmap.series.keys().next()?;
        let last = *perfmap.series.keys().next_back()?;
        // A bound of 0 nodes means no bound
        let lo = self
            .min_nodes
            .filter(|n| *n > 0)
            .map_or(first, |n| (u64::from(n) * self.ppn()).max(first));
        let hi = self
            .max_nodes
            .filter(|n| *n > 0)
            .map_or(last, |n| (u64::from(n) * self.ppn()).min(last));
        Some((lo, hi))
    }

    fn lookup(&self, series: &XySeries, x: f64) -> Option<f64> {
        if self.interpolate {
            series.value_at(x)?.first().copied()
        } else {
            series.exact_at(x)?.first().copied()
        }
    }
}

fn scaling<F: Fn(f64) -> f64>(
    perfmap: &PerformanceMap,
    opts: &ScalingOptions,
    normalize: bool,
    target_size: F,
) -> ScalingCurve {
    let Some((lo, hi)) = opts.procs_range(perfmap).filter(|(lo, hi)| lo <= hi) else {
        return Vec::new();
    };
    let ppn = opts.ppn() as f64;

    perfmap
        .series
        .range(lo..=hi)
        .filter_map(|(procs, series)| {
            let nodes = *procs as f64 / ppn;
            let value = opts.lookup(series, target_size(nodes))?;
            Some((nodes, if normalize { value / nodes } else { value }))
        })
        .collect()
}

/// Performance at `size_per_node` work per node, over node count
#[must_use]
pub fn weak_scaling(
    perfmap: &PerformanceMap,
    size_per_node: f64,
    opts: &ScalingOptions,
    normalize: bool,
) -> ScalingCurve {
    scaling(perfmap, opts, normalize, |nodes| nodes * size_per_node)
}

/// Performance at a fixed `total_size`, over node count
#[must_use]
pub fn strong_scaling(
    perfmap: &PerformanceMap,
    total_size: f64,
    opts: &ScalingOptions,
    normalize: bool,
) -> ScalingCurve {
    scaling(perfmap, opts, normalize, |_| total_size)
}

fn efficiency(curve: ScalingCurve, ref_perf: Option<f64>) -> ScalingCurve {
    let reference = ref_perf
        .filter(|r| *r != 0.0)
        .or_else(|| curve.first().map(|(_, v)| *v))
        .unwrap_or(1.0);
    curve
        .into_iter()
        .map(|(nodes, value)| (nodes, value / reference))
        .collect()
}

/// Per-node weak scaling relative to `ref_perf`, or to the smallest node
/// count when `ref_perf` is `None` or zero.
///
/// `None` when no process count has a value at the target size.
#[must_use]
pub fn weak_efficiency(
    perfmap: &PerformanceMap,
    size_per_node: f64,
    opts: &ScalingOptions,
    ref_perf: Option<f64>,
) -> Option<ScalingCurve> {
    log::info!("Extracting weak efficiency for size per node {size_per_node}");
    let curve = weak_scaling(perfmap, size_per_node, opts, true);
    if curve.is_empty() {
        log::error!("No weak scaling data for size per node {size_per_node}");
        return None;
    }
    Some(efficiency(curve, ref_perf))
}

/// Per-node strong scaling relative to `ref_perf`, or to the smallest node
/// count when `ref_perf` is `None` or zero.
///
/// `None` when no process count has a value at `total_size`.
#[must_use]
pub fn strong_efficiency(
    perfmap: &PerformanceMap,
    total_size: f64,
    opts: &ScalingOptions,
    ref_perf: Option<f64>,
) -> Option<ScalingCurve> {
    log::info!("Extracting strong efficiency for total size {total_size}");
    let curve = strong_scaling(perfmap, total_size, opts, true);
    if curve.is_empty() {
        log::error!("No strong scaling data for total size {total_size}");
        return None;
    }
    Some(efficiency(curve, ref_perf))
}
