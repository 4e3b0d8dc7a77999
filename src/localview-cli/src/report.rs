// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Flattens a `SimulationResult` into plain, serializable rows.
//!
//! The engine's result borrows from and points into the graph, so the
//! report resolves every handle to a name up front.  Both the text and
//! JSON outputs are rendered from the same `Report`.

use std::io::{self, Write};

use serde::Serialize;

use localview_engine::{
    Graph, Histogram, NodeId, Result, SimulationConfig, SimulationResult, border_markers,
};

#[derive(Debug, Serialize)]
pub struct TileMarker {
    pub map: String,
    pub step: usize,
}

#[derive(Debug, Serialize)]
pub struct CellReport {
    pub container: String,
    pub index: Vec<i64>,
    pub offset: i64,
    pub access_count: usize,
    pub distances: Vec<i64>,
    /// `(distance, occurrences)`, with cold touches under -1
    pub stack_distances: Vec<(i64, usize)>,
    pub cold_misses: usize,
    pub total_misses: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
    /// heat-map rank in [0, 1] under the configured metric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
    pub tiles: Vec<TileMarker>,
}

#[derive(Debug, Serialize)]
pub struct HistogramReport<K> {
    pub keys: Vec<K>,
    pub counts: Vec<usize>,
}

impl<K: Copy + Eq + std::hash::Hash + Ord> From<&Histogram<K>> for HistogramReport<K> {
    fn from(histogram: &Histogram<K>) -> Self {
        let (keys, counts) = histogram.iter().unzip();
        HistogramReport { keys, counts }
    }
}

#[derive(Debug, Serialize)]
pub struct MapReport {
    pub label: String,
    pub steps: usize,
}

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub label: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Histograms {
    pub access_counts: HistogramReport<usize>,
    pub reuse_distances: HistogramReport<i64>,
    pub metric: HistogramReport<f64>,
    pub misses: HistogramReport<usize>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub name: String,
    pub config: SimulationConfig,
    pub maps: Vec<MapReport>,
    pub failures: Vec<FailureReport>,
    pub cells: Vec<CellReport>,
    pub histograms: Histograms,
}

fn label(graph: &Graph, id: NodeId) -> String {
    match graph.node(id) {
        Some(node) if !node.label().is_empty() => node.label().to_owned(),
        _ => id.to_string(),
    }
}

impl Report {
    pub fn new(graph: &Graph, result: &SimulationResult) -> Result<Report> {
        let ctx = &result.context;
        let metric = result.config.metric;

        let maps = result
            .traces
            .iter()
            .map(|(id, trace)| MapReport {
                label: label(graph, *id),
                steps: trace.len(),
            })
            .collect();

        let failures = result
            .failures
            .iter()
            .map(|failure| FailureReport {
                label: label(graph, failure.map),
                code: failure.error.code.to_string(),
                message: failure.error.to_string(),
            })
            .collect();

        let mut cells = Vec::new();
        for (key, stats) in ctx.cells() {
            if stats.access_count == 0 {
                continue;
            }
            let Some(container) = graph.container(key.container) else {
                continue;
            };
            let tiles = match graph.memory_node_for(key.container) {
                Some(memory) => border_markers(graph, &result.traces, memory, &stats.index)?
                    .into_iter()
                    .map(|(map, step)| TileMarker {
                        map: label(graph, map),
                        step,
                    })
                    .collect(),
                None => vec![],
            };
            cells.push(CellReport {
                container: container.name.clone(),
                index: stats.index.to_vec(),
                offset: key.offset,
                access_count: stats.access_count,
                distances: stats.distances.clone(),
                stack_distances: stats.stack_distances.iter().map(|(d, n)| (*d, *n)).collect(),
                cold_misses: stats.cold_misses,
                total_misses: stats.total_misses,
                metric: stats.metric(metric),
                percentile: ctx.percentile(*key, metric),
                tiles,
            });
        }

        let metric_histogram = ctx.metric_histogram(metric);
        let histograms = Histograms {
            access_counts: ctx.access_count_histogram().into(),
            reuse_distances: ctx.reuse_distance_histogram().into(),
            metric: HistogramReport {
                keys: metric_histogram.sorted_keys().iter().map(|k| k.0).collect(),
                counts: metric_histogram.iter().map(|(_, n)| n).collect(),
            },
            misses: ctx.miss_histogram().into(),
        };

        Ok(Report {
            name: graph.name.clone(),
            config: result.config.clone(),
            maps,
            failures,
            cells,
            histograms,
        })
    }

    pub fn write_json(&self, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)
    }

    pub fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        let name = if self.name.is_empty() {
            "<unnamed>"
        } else {
            self.name.as_str()
        };
        writeln!(
            out,
            "{name}: line {} bytes, threshold {}, metric {}",
            self.config.cache_line_bytes, self.config.reuse_threshold, self.config.metric
        )?;
        for map in self.maps.iter() {
            writeln!(out, "map {}: {} steps", map.label, map.steps)?;
        }
        for failure in self.failures.iter() {
            writeln!(out, "map {} failed: {}", failure.label, failure.message)?;
        }

        let mut container = "";
        for cell in self.cells.iter() {
            if cell.container != container {
                container = &cell.container;
                writeln!(out)?;
                writeln!(out, "{container}")?;
            }
            let index: Vec<String> = cell.index.iter().map(|i| i.to_string()).collect();
            let metric = match cell.metric {
                Some(m) => format!("{m}"),
                None => "-".to_owned(),
            };
            let rank = match cell.percentile {
                Some(p) => format!("{p:.2}"),
                None => "-".to_owned(),
            };
            let tiles: Vec<String> = cell
                .tiles
                .iter()
                .map(|t| format!("{}:{}", t.map, t.step))
                .collect();
            writeln!(
                out,
                "  [{}]\taccesses {}\tcold {}\tmisses {}\t{} {}\trank {}\ttiles {}",
                index.join(", "),
                cell.access_count,
                cell.cold_misses,
                cell.total_misses,
                self.config.metric,
                metric,
                rank,
                tiles.join(" "),
            )?;
        }

        writeln!(out)?;
        write_histogram(out, "access counts", &self.histograms.access_counts)?;
        write_histogram(out, "reuse distances", &self.histograms.reuse_distances)?;
        write_histogram(out, "metric", &self.histograms.metric)?;
        write_histogram(out, "misses", &self.histograms.misses)
    }
}

fn write_histogram<K: std::fmt::Display>(
    out: &mut dyn Write,
    title: &str,
    histogram: &HistogramReport<K>,
) -> io::Result<()> {
    let buckets: Vec<String> = histogram
        .keys
        .iter()
        .zip(histogram.counts.iter())
        .map(|(k, n)| format!("{k}:{n}"))
        .collect();
    writeln!(out, "{title}: {}", buckets.join(" "))
}
