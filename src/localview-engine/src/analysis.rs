// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Reuse-distance analysis over simulated traces.
//!
//! [`simulate`] enumerates every top-level map of a [`Graph`] and then
//! replays the resulting traces through one LRU stack per map.  Stack keys
//! are cache lines, so touching any element of a line is a touch of the
//! whole line, and they include the container so lines never span two
//! containers.  Each touch is charged to the cell (container element) that
//! was actually accessed.
//!
//! All counters live in a [`SimulationContext`] owned by the returned
//! [`SimulationResult`]; the global histograms are kept in step with the
//! per-cell counters one mutation at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, trace, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::access_stack::AccessStack;
use crate::addressing::Index;
use crate::cache_line::line_key;
use crate::common::Error;
use crate::graph::{ContainerId, Graph, NodeId};
use crate::histogram::Histogram;
use crate::map::{MapSimulation, MapTrace, TraceEntry};
use crate::tiling::{self, TilingRegion};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReuseDistanceMetric {
    #[default]
    Median,
    Min,
    Max,
    Misses,
}

impl ReuseDistanceMetric {
    pub const ALL: [ReuseDistanceMetric; 4] = [
        ReuseDistanceMetric::Median,
        ReuseDistanceMetric::Min,
        ReuseDistanceMetric::Max,
        ReuseDistanceMetric::Misses,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ReuseDistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ReuseDistanceMetric::Median => "median",
            ReuseDistanceMetric::Min => "min",
            ReuseDistanceMetric::Max => "max",
            ReuseDistanceMetric::Misses => "misses",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ReuseDistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReuseDistanceMetric::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

fn default_cache_line_bytes() -> i64 {
    64
}

fn default_reuse_threshold() -> i64 {
    8
}

fn default_max_trace_steps() -> usize {
    1_000_000
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 0 disables cache-line grouping
    #[serde(default = "default_cache_line_bytes")]
    pub cache_line_bytes: i64,
    /// touches at or beyond this distance count as misses
    #[serde(default = "default_reuse_threshold")]
    pub reuse_threshold: i64,
    /// overrides for free symbols
    #[serde(default)]
    pub symbols: BTreeMap<String, f64>,
    #[serde(default = "default_max_trace_steps")]
    pub max_trace_steps: usize,
    #[serde(default)]
    pub metric: ReuseDistanceMetric,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            cache_line_bytes: default_cache_line_bytes(),
            reuse_threshold: default_reuse_threshold(),
            symbols: BTreeMap::new(),
            max_trace_steps: default_max_trace_steps(),
            metric: ReuseDistanceMetric::default(),
        }
    }
}

/// Identifies a cell: one element of one container.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellKey {
    pub container: ContainerId,
    /// element offset within the container
    pub offset: i64,
}

/// The histogram-visible values of a cell; `None` means the cell is not
/// counted in that histogram.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct CellSummary {
    misses: Option<usize>,
    metrics: [Option<OrderedFloat<f64>>; 4],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CellStats {
    pub index: Index,
    /// stacked access count; playback rewinds and replays this
    pub access_count: usize,
    /// distance -> occurrences, including cold touches under -1
    pub stack_distances: BTreeMap<i64, usize>,
    /// non-cold distances, in the order they were observed
    pub distances: Vec<i64>,
    pub cold_misses: usize,
    pub total_misses: usize,
}

impl CellStats {
    fn new(index: Index) -> Self {
        CellStats {
            index,
            ..Default::default()
        }
    }

    pub fn metric(&self, metric: ReuseDistanceMetric) -> Option<f64> {
        match metric {
            ReuseDistanceMetric::Median => self.median(),
            ReuseDistanceMetric::Min => self.warm().next().map(|(d, _)| d as f64),
            ReuseDistanceMetric::Max => self.warm().next_back().map(|(d, _)| d as f64),
            ReuseDistanceMetric::Misses => {
                (self.total_misses > 0).then_some(self.total_misses as f64)
            }
        }
    }

    fn warm(&self) -> impl DoubleEndedIterator<Item = (i64, usize)> + '_ {
        self.stack_distances.range(0..).map(|(d, n)| (*d, *n))
    }

    fn median(&self) -> Option<f64> {
        let n = self.distances.len();
        if n == 0 {
            return None;
        }
        // nth smallest warm distance, walking the counts in order
        let nth = |target: usize| -> Option<i64> {
            let mut seen = 0;
            self.warm().find_map(|(d, count)| {
                seen += count;
                (seen > target).then_some(d)
            })
        };
        let hi = nth(n / 2)?;
        if n % 2 == 1 {
            Some(hi as f64)
        } else {
            let lo = nth(n / 2 - 1)?;
            Some((lo + hi) as f64 / 2.0)
        }
    }

    pub(crate) fn summary(&self) -> CellSummary {
        let mut metrics = [None; 4];
        for metric in ReuseDistanceMetric::ALL {
            metrics[metric.slot()] = self.metric(metric).map(OrderedFloat);
        }
        CellSummary {
            misses: (self.total_misses > 0).then_some(self.total_misses),
            metrics,
        }
    }

    /// Record one touch at `distance`, returning the cell's summary before
    /// and after so histograms can be moved in a single step.
    pub(crate) fn record(&mut self, distance: i64, threshold: i64) -> (CellSummary, CellSummary) {
        let before = self.summary();
        *self.stack_distances.entry(distance).or_insert(0) += 1;
        if distance < 0 {
            self.cold_misses += 1;
        } else {
            self.distances.push(distance);
        }
        if distance < 0 || distance >= threshold {
            self.total_misses += 1;
        }
        (before, self.summary())
    }
}

/// Per-cell counters and the global histograms derived from them.
#[derive(Clone, Debug, Default)]
pub struct SimulationContext {
    cells: BTreeMap<CellKey, CellStats>,
    access_counts: Histogram<usize>,
    reuse_distances: Histogram<i64>,
    metrics: [Histogram<OrderedFloat<f64>>; 4],
    misses: Histogram<usize>,
}

impl SimulationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, key: CellKey) -> Option<&CellStats> {
        self.cells.get(&key)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &CellStats)> {
        self.cells.iter()
    }

    /// Histogram of stacked access counts over cells with a count above 0.
    pub fn access_count_histogram(&self) -> &Histogram<usize> {
        &self.access_counts
    }

    /// One occurrence per non-cold distance sample.
    pub fn reuse_distance_histogram(&self) -> &Histogram<i64> {
        &self.reuse_distances
    }

    /// Per-cell values of `metric`, over cells where it is defined.
    pub fn metric_histogram(&self, metric: ReuseDistanceMetric) -> &Histogram<OrderedFloat<f64>> {
        &self.metrics[metric.slot()]
    }

    /// Per-cell total misses over cells with at least one miss.
    pub fn miss_histogram(&self) -> &Histogram<usize> {
        &self.misses
    }

    fn cell_mut(&mut self, key: CellKey, index: &[i64]) -> &mut CellStats {
        self.cells
            .entry(key)
            .or_insert_with(|| CellStats::new(index.iter().copied().collect()))
    }

    pub fn add_access(&mut self, key: CellKey, index: &[i64]) {
        let cell = self.cell_mut(key, index);
        let old = cell.access_count;
        cell.access_count += 1;
        let new = cell.access_count;
        self.access_counts
            .reclassify((old > 0).then_some(old), Some(new));
    }

    /// Rewind every stacked access count to zero, leaving the distance
    /// counters alone.
    pub fn reset_access_counts(&mut self) {
        for cell in self.cells.values_mut() {
            cell.access_count = 0;
        }
        self.access_counts.clear();
    }

    pub fn record_distance(&mut self, key: CellKey, index: &[i64], distance: i64, threshold: i64) {
        let (before, after) = self.cell_mut(key, index).record(distance, threshold);
        if distance >= 0 {
            self.reuse_distances.add(distance);
        }
        self.misses.reclassify(before.misses, after.misses);
        for (slot, histogram) in self.metrics.iter_mut().enumerate() {
            histogram.reclassify(before.metrics[slot], after.metrics[slot]);
        }
    }

    /// Where `key`'s value of `metric` ranks among all cells, in `[0, 1]`.
    pub fn percentile(&self, key: CellKey, metric: ReuseDistanceMetric) -> Option<f64> {
        let value = self.cell(key)?.metric(metric)?;
        Some(self.metric_histogram(metric).percentile(OrderedFloat(value)))
    }

    /// Where `key`'s stacked access count ranks among all counted cells.
    pub fn access_percentile(&self, key: CellKey) -> Option<f64> {
        let count = self.cell(key)?.access_count;
        (count > 0).then(|| self.access_counts.percentile(count))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.access_counts.clear();
        self.reuse_distances.clear();
        for histogram in self.metrics.iter_mut() {
            histogram.clear();
        }
        self.misses.clear();
    }
}

impl PartialEq for SimulationContext {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
            && self.access_counts == other.access_counts
            && self.reuse_distances == other.reuse_distances
            && self.metrics == other.metrics
            && self.misses == other.misses
    }
}

/// Apply the access counts of one trace entry.  Accesses with unresolved
/// or out-of-bounds indices are skipped.
pub(crate) fn apply_access_counts(
    graph: &Graph,
    context: &mut SimulationContext,
    entry: &TraceEntry,
) {
    for access in entry.accesses.iter() {
        let Some(container) = graph.container(access.container) else {
            continue;
        };
        let Some(index) = container.resolve(&access.index) else {
            continue;
        };
        if !container.contains(&index) {
            continue;
        }
        if let Some(offset) = container.element_offset(&index) {
            let key = CellKey {
                container: access.container,
                offset,
            };
            context.add_access(key, &index);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapFailure {
    pub map: NodeId,
    pub error: Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    pub traces: BTreeMap<NodeId, MapTrace>,
    /// maps whose shape could not be simulated; siblings are unaffected
    pub failures: Vec<MapFailure>,
    pub context: SimulationContext,
    pub config: SimulationConfig,
}

impl SimulationResult {
    /// Clear every counter and histogram and derive them again from the
    /// recorded traces.
    pub fn recalculate_all(&mut self, graph: &Graph) {
        self.context.clear();
        let line_bytes = self.config.cache_line_bytes;
        let threshold = self.config.reuse_threshold;

        for (map, trace) in self.traces.iter() {
            let mut stack: AccessStack<(ContainerId, i64)> = AccessStack::new();
            for entry in trace.entries.iter() {
                apply_access_counts(graph, &mut self.context, entry);
                for access in entry.accesses.iter() {
                    let Some(container) = graph.container(access.container) else {
                        continue;
                    };
                    let Some(index) = container.resolve(&access.index) else {
                        trace!("{map}: skipping unresolved access to {}", container.name);
                        continue;
                    };
                    if !container.contains(&index) {
                        trace!("{map}: skipping out-of-bounds access to {}", container.name);
                        continue;
                    }
                    let (Some(offset), Some(line)) = (
                        container.element_offset(&index),
                        line_key(container, &index, line_bytes),
                    ) else {
                        continue;
                    };
                    let distance = stack.touch((access.container, line));
                    let key = CellKey {
                        container: access.container,
                        offset,
                    };
                    self.context.record_distance(key, &index, distance, threshold);
                }
            }
            debug!("{map}: {} distinct lines touched", stack.len());
        }
    }

    /// Change the cache-line size and miss threshold and recompute.
    pub fn reconfigure(&mut self, graph: &Graph, cache_line_bytes: i64, reuse_threshold: i64) {
        self.config.cache_line_bytes = cache_line_bytes;
        self.config.reuse_threshold = reuse_threshold;
        self.recalculate_all(graph);
    }

    pub fn trace(&self, map: NodeId) -> Option<&MapTrace> {
        self.traces.get(&map)
    }

    pub fn tiling_regions_for<'a>(
        &'a self,
        graph: &Graph,
        memory: NodeId,
        index: &[i64],
    ) -> crate::common::Result<Vec<TilingRegion<'a>>> {
        tiling::tiling_regions_for(graph, &self.traces, memory, index)
    }
}

/// Enumerate and analyze every top-level map of `graph`.  A map that
/// cannot be simulated is recorded in [`SimulationResult::failures`] and
/// contributes nothing.
pub fn simulate(graph: &Graph, config: &SimulationConfig) -> SimulationResult {
    let sim = MapSimulation::new(graph, config);
    let mut traces = BTreeMap::new();
    let mut failures = vec![];

    for map in graph.top_level_maps() {
        match sim.run(map) {
            Ok(trace) => {
                traces.insert(map, trace);
            }
            Err(error) => {
                let label = graph.node(map).map(|n| n.label()).unwrap_or("");
                warn!("map {map} '{label}' not simulated: {error}");
                failures.push(MapFailure { map, error });
            }
        }
    }

    let mut result = SimulationResult {
        traces,
        failures,
        context: SimulationContext::new(),
        config: config.clone(),
    };
    result.recalculate_all(graph);
    result
}
