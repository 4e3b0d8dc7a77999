// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use crate::common::Result;
use crate::eval::Scope;
use crate::graph::{Graph, NodeId, NodeKind};
use crate::map::{AccessMap, MapTrace};
use crate::model_err;

/// One trace step of a map adjacent to a memory node that touched a given
/// element of that memory.
#[derive(Clone, Debug, PartialEq)]
pub struct TilingRegion<'a> {
    pub map: NodeId,
    pub step: usize,
    pub scope: &'a Scope,
    pub access_map: &'a AccessMap,
}

/// Every step, across the maps adjacent to `memory`, whose access map
/// holds the memory's container at exactly `index`.  Regions come back
/// ordered by map handle, then step.
pub fn tiling_regions_for<'a>(
    graph: &Graph,
    traces: &'a BTreeMap<NodeId, MapTrace>,
    memory: NodeId,
    index: &[i64],
) -> Result<Vec<TilingRegion<'a>>> {
    let container = match graph.node(memory).map(|n| &n.kind) {
        Some(NodeKind::Memory(mem)) => mem.container,
        _ => return model_err!(BadNodeHandle, format!("{memory} is not a memory node")),
    };

    let mut maps: Vec<NodeId> = graph
        .neighbors(memory)
        .iter()
        .copied()
        .filter(|id| graph.map(*id).is_some())
        .collect();
    maps.sort_unstable();

    let mut regions = vec![];
    for map in maps {
        let Some(trace) = traces.get(&map) else {
            continue;
        };
        for (step, entry) in trace.entries.iter().enumerate() {
            if entry.touches(container, index) {
                regions.push(TilingRegion {
                    map,
                    step,
                    scope: &entry.scope,
                    access_map: &entry.access_map,
                });
            }
        }
    }
    Ok(regions)
}

/// Stable `(map, step)` markers for the regions touching `index`, used to
/// pick border colors.
pub fn border_markers(
    graph: &Graph,
    traces: &BTreeMap<NodeId, MapTrace>,
    memory: NodeId,
    index: &[i64],
) -> Result<Vec<(NodeId, usize)>> {
    let regions = tiling_regions_for(graph, traces, memory, index)?;
    Ok(regions.into_iter().map(|r| (r.map, r.step)).collect())
}
