// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Step-by-step replay of one map's trace.
//!
//! Starting playback rewinds every stacked access count; each step then
//! applies one trace entry's accesses.  Distance counters are left as the
//! last full recalculation computed them.

use log::trace;

use crate::analysis::{SimulationResult, apply_access_counts};
use crate::common::Result;
use crate::eval::Scope;
use crate::graph::{Graph, NodeId};
use crate::model_err;

pub struct Playback<'a> {
    graph: &'a Graph,
    result: &'a mut SimulationResult,
    map: NodeId,
    cursor: usize,
}

impl<'a> Playback<'a> {
    pub fn new(graph: &'a Graph, result: &'a mut SimulationResult, map: NodeId) -> Result<Self> {
        if result.trace(map).is_none() {
            return model_err!(BadNodeHandle, format!("no trace recorded for {map}"));
        }
        result.context.reset_access_counts();
        Ok(Playback {
            graph,
            result,
            map,
            cursor: 0,
        })
    }

    /// Apply the next trace entry, returning its scope, or `None` once the
    /// trace is exhausted.
    pub fn step(&mut self) -> Option<&Scope> {
        let trace = self.result.traces.get(&self.map)?;
        let entry = trace.entries.get(self.cursor)?;
        apply_access_counts(self.graph, &mut self.result.context, entry);
        trace!("{}: step {} at {}", self.map, self.cursor, entry.scope);
        self.cursor += 1;
        Some(&entry.scope)
    }

    pub fn run_to_end(&mut self) {
        while self.step().is_some() {}
    }

    /// Rewind to before the first step.
    pub fn reset(&mut self) {
        self.result.context.reset_access_counts();
        self.cursor = 0;
    }

    /// Number of steps applied so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.result.trace(self.map).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.len()
    }

    pub fn result(&self) -> &SimulationResult {
        &*self.result
    }
}
