// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Enumeration of a map's iteration space into a trace of concrete
//! accesses.
//!
//! A top-level map produces one [`TraceEntry`] per binding of its own
//! ranges.  Nested maps in its body are enumerated in full under that
//! binding and contribute their accesses to the same entry, so an entry is
//! one tile of the outer iteration space.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;
use smallvec::SmallVec;

use crate::addressing::ConcreteIndex;
use crate::analysis::SimulationConfig;
use crate::common::Result;
use crate::datamodel::AccessMode;
use crate::eval::{Scope, SymbolicExpr, to_integer};
use crate::graph::{ContainerId, Graph, NodeId, NodeKind, Range, SymbolicAccess};
use crate::{model_err, sim_err};

/// A resolved access: one touch of `container` at `index` under a scope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Access {
    pub container: ContainerId,
    pub mode: AccessMode,
    pub index: ConcreteIndex,
}

pub type AccessMap = BTreeMap<ContainerId, Vec<(AccessMode, ConcreteIndex)>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    pub scope: Scope,
    pub access_map: AccessMap,
    /// every access, in the order the body produced them
    pub accesses: Vec<Access>,
}

impl TraceEntry {
    fn new(scope: Scope) -> Self {
        TraceEntry {
            scope,
            access_map: AccessMap::new(),
            accesses: vec![],
        }
    }

    fn push(&mut self, access: Access) {
        self.access_map
            .entry(access.container)
            .or_default()
            .push((access.mode, access.index.clone()));
        self.accesses.push(access);
    }

    /// Whether this entry touched `container` at exactly `index`.
    pub fn touches(&self, container: ContainerId, index: &[i64]) -> bool {
        self.access_map.get(&container).is_some_and(|list| {
            list.iter().any(|(_, idx)| {
                idx.len() == index.len() && idx.iter().zip(index).all(|(a, b)| *a == Some(*b))
            })
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapTrace {
    pub map: NodeId,
    pub entries: Vec<TraceEntry>,
}

impl MapTrace {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The concrete values a range iterates over under some scope.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Bounds {
    start: f64,
    end: f64,
    step: f64,
}

impl Bounds {
    fn values(self) -> impl Iterator<Item = f64> {
        (0u64..)
            .map(move |k| self.start + k as f64 * self.step)
            .take_while(move |v| {
                if self.step > 0.0 {
                    *v <= self.end
                } else {
                    *v >= self.end
                }
            })
    }
}

pub struct MapSimulation<'a> {
    graph: &'a Graph,
    base: Scope,
    max_steps: usize,
}

impl<'a> MapSimulation<'a> {
    pub fn new(graph: &'a Graph, config: &SimulationConfig) -> Self {
        let mut base: Scope = graph
            .symbols
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (name, value) in config.symbols.iter() {
            base.insert(name, *value);
        }
        MapSimulation {
            graph,
            base,
            max_steps: config.max_trace_steps,
        }
    }

    /// Enumerate `map`'s iteration space from the base scope.
    pub fn run(&self, map: NodeId) -> Result<MapTrace> {
        let Some(node) = self.graph.map(map) else {
            return model_err!(BadNodeHandle, format!("{map} is not a map"));
        };

        let mut entries = vec![];
        let mut steps = 0;
        let mut record = |sim: &Self, scope: &Scope, steps: &mut usize| -> Result<()> {
            let mut entry = TraceEntry::new(scope.clone());
            sim.accesses_for(map, scope, steps, &mut entry)?;
            trace!("{map}: {scope} -> {} accesses", entry.accesses.len());
            entries.push(entry);
            Ok(())
        };
        self.enumerate(map, &node.ranges, self.base.clone(), &mut steps, &mut record)?;

        debug!("{map}: {} trace entries", entries.len());
        Ok(MapTrace { map, entries })
    }

    /// Resolve the accesses `map`'s body makes under a full binding of its
    /// ranges, in child order.
    pub fn accesses_for(
        &self,
        map: NodeId,
        scope: &Scope,
        steps: &mut usize,
        entry: &mut TraceEntry,
    ) -> Result<()> {
        let Some(node) = self.graph.node(map) else {
            return model_err!(BadNodeHandle, format!("{map} does not exist"));
        };
        for child in node.children.iter().copied() {
            let Some(child_node) = self.graph.node(child) else {
                continue;
            };
            match &child_node.kind {
                NodeKind::Computation(comp) => {
                    for access in comp.accesses.iter() {
                        entry.push(self.resolve(access, scope)?);
                    }
                }
                NodeKind::Map(inner) => {
                    let mut record = |sim: &Self, scope: &Scope, steps: &mut usize| {
                        sim.accesses_for(child, scope, steps, entry)
                    };
                    self.enumerate(child, &inner.ranges, scope.clone(), steps, &mut record)?;
                }
                NodeKind::Memory(_) => {}
            }
        }
        Ok(())
    }

    fn resolve(&self, access: &SymbolicAccess, scope: &Scope) -> Result<Access> {
        if access.dynamic {
            return sim_err!(
                UnsupportedVolume,
                format!("dynamic access to {}", self.container_name(access.container))
            );
        }
        if access.volume.eval(scope).and_then(to_integer) != Some(1) {
            return sim_err!(
                UnsupportedVolume,
                format!(
                    "access to {} has volume {}",
                    self.container_name(access.container),
                    access.volume
                )
            );
        }

        let index: ConcreteIndex = access
            .index
            .iter()
            .map(|expr| expr.eval_index(scope))
            .collect();
        Ok(Access {
            container: access.container,
            mode: access.mode,
            index,
        })
    }

    fn container_name(&self, id: ContainerId) -> &str {
        self.graph
            .container(id)
            .map(|c| c.name.as_str())
            .unwrap_or("?")
    }

    /// Bind each range in turn, calling `body` once for every complete
    /// binding.
    fn enumerate(
        &self,
        map: NodeId,
        ranges: &[Range],
        mut scope: Scope,
        steps: &mut usize,
        body: &mut dyn FnMut(&Self, &Scope, &mut usize) -> Result<()>,
    ) -> Result<()> {
        let Some((range, rest)) = ranges.split_first() else {
            *steps += 1;
            if *steps > self.max_steps {
                return sim_err!(
                    IterationLimit,
                    format!("{map} exceeds {} iterations", self.max_steps)
                );
            }
            return body(self, &scope, steps);
        };

        let Some(bounds) = self.bounds(range, &mut scope)? else {
            debug!("{map}: range '{}' is unresolved under {scope}, skipping", range.var);
            return Ok(());
        };

        for value in bounds.values() {
            let inner = scope.with(&range.var, value);
            self.enumerate(map, rest, inner, steps, body)?;
        }
        Ok(())
    }

    fn bounds(&self, range: &Range, scope: &mut Scope) -> Result<Option<Bounds>> {
        let resolve = |scope: &Scope| -> SmallVec<[Option<f64>; 3]> {
            [&range.start, &range.end, &range.step]
                .iter()
                .map(|expr: &&SymbolicExpr| expr.eval(scope))
                .collect()
        };

        let mut resolved = resolve(&*scope);
        if resolved.iter().any(Option::is_none) {
            if let Some(free) = &range.free_symbol {
                if !scope.contains(&free.name) {
                    scope.insert(&free.name, free.default);
                    resolved = resolve(&*scope);
                }
            }
        }

        let (Some(start), Some(end), Some(step)) = (resolved[0], resolved[1], resolved[2]) else {
            return Ok(None);
        };
        if step == 0.0 {
            return sim_err!(ZeroStep, format!("range '{}' has a step of 0", range.var));
        }
        Ok(Some(Bounds { start, end, step }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{Container, Dimension};
    use crate::common::ErrorCode;
    use smallvec::smallvec;

    fn matrix_graph(ranges: Vec<Range>) -> (Graph, NodeId, ContainerId) {
        let mut graph = Graph::new("test");
        let a = graph
            .add_container(Container::new(
                "A",
                vec![Dimension::new("N", 2), Dimension::new("M", 3)],
                8,
            ))
            .unwrap();
        let map = graph.add_map(None, "m", ranges).unwrap();
        let access = SymbolicAccess::new(a, AccessMode::Read, &["i", "j"]);
        graph.add_computation(map, "c", vec![access]).unwrap();
        (graph, map, a)
    }

    fn run(graph: &Graph, map: NodeId) -> Result<MapTrace> {
        MapSimulation::new(graph, &SimulationConfig::default()).run(map)
    }

    fn scopes(trace: &MapTrace) -> Vec<String> {
        trace.entries.iter().map(|e| e.scope.to_string()).collect()
    }

    #[test]
    fn test_row_major_enumeration() {
        let (graph, map, a) =
            matrix_graph(vec![Range::new("i", 0.0, 1.0), Range::new("j", 0.0, 2.0)]);
        let trace = run(&graph, map).unwrap();
        assert_eq!(
            vec![
                "(i=0, j=0)",
                "(i=0, j=1)",
                "(i=0, j=2)",
                "(i=1, j=0)",
                "(i=1, j=1)",
                "(i=1, j=2)"
            ],
            scopes(&trace)
        );
        let last = trace.entries.last().unwrap();
        let expected: ConcreteIndex = smallvec![Some(1), Some(2)];
        assert_eq!(vec![(AccessMode::Read, expected)], last.access_map[&a]);
        assert!(last.touches(a, &[1, 2]));
        assert!(!last.touches(a, &[1, 1]));
    }

    #[test]
    fn test_negative_and_strided_steps() {
        let (graph, map, _) = matrix_graph(vec![
            Range::new("i", 1.0, 0.0).with_step(-1.0),
            Range::new("j", 0.0, 2.0).with_step(2.0),
        ]);
        let trace = run(&graph, map).unwrap();
        assert_eq!(
            vec!["(i=1, j=0)", "(i=1, j=2)", "(i=0, j=0)", "(i=0, j=2)"],
            scopes(&trace)
        );
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let (graph, map, _) = matrix_graph(vec![Range::new("i", 0.0, 1.0).with_step("N - N")]);
        let mut config = SimulationConfig::default();
        config.symbols.insert("N".to_owned(), 4.0);
        let err = MapSimulation::new(&graph, &config).run(map).unwrap_err();
        assert_eq!(ErrorCode::ZeroStep, err.code);
    }

    #[test]
    fn test_free_symbol_defaults() {
        let ranges = vec![
            Range::new("i", 0.0, "N - 1").with_free_symbol("N", 2.0),
            Range::new("j", 0.0, 0.0),
        ];
        let (graph, map, _) = matrix_graph(ranges);
        let trace = run(&graph, map).unwrap();
        assert_eq!(vec!["(N=2, i=0, j=0)", "(N=2, i=1, j=0)"], scopes(&trace));

        // overrides win over the default
        let mut config = SimulationConfig::default();
        config.symbols.insert("N".to_owned(), 1.0);
        let trace = MapSimulation::new(&graph, &config).run(map).unwrap();
        assert_eq!(vec!["(N=1, i=0, j=0)"], scopes(&trace));
    }

    #[test]
    fn test_unresolved_bound_is_empty() {
        let (graph, map, _) = matrix_graph(vec![Range::new("i", 0.0, "K")]);
        let trace = run(&graph, map).unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn test_unresolved_index_component() {
        let mut graph = Graph::new("test");
        let a = graph
            .add_container(Container::new("a", vec![Dimension::new("N", 4)], 8))
            .unwrap();
        let map = graph
            .add_map(None, "m", vec![Range::new("i", 0.0, 1.0)])
            .unwrap();
        let access = SymbolicAccess::new(a, AccessMode::Write, &["i / 2"]);
        graph.add_computation(map, "c", vec![access]).unwrap();

        let trace = run(&graph, map).unwrap();
        let indices: Vec<ConcreteIndex> = trace
            .entries
            .iter()
            .map(|e| e.accesses[0].index.clone())
            .collect();
        let expected: Vec<ConcreteIndex> = vec![smallvec![Some(0)], smallvec![None]];
        assert_eq!(expected, indices);
    }

    #[test]
    fn test_nested_maps_share_an_entry() {
        let mut graph = Graph::new("nested");
        let a = graph
            .add_container(Container::new(
                "A",
                vec![Dimension::new("N", 2), Dimension::new("M", 3)],
                8,
            ))
            .unwrap();
        let outer = graph
            .add_map(None, "outer", vec![Range::new("i", 0.0, 1.0)])
            .unwrap();
        let inner = graph
            .add_map(Some(outer), "inner", vec![Range::new("j", 0.0, 2.0)])
            .unwrap();
        let access = SymbolicAccess::new(a, AccessMode::Read, &["i", "j"]);
        graph.add_computation(inner, "c", vec![access]).unwrap();

        let trace = run(&graph, outer).unwrap();
        assert_eq!(vec!["(i=0)", "(i=1)"], scopes(&trace));
        let second: Vec<ConcreteIndex> = trace.entries[1]
            .accesses
            .iter()
            .map(|a| a.index.clone())
            .collect();
        let expected: Vec<ConcreteIndex> = vec![
            smallvec![Some(1), Some(0)],
            smallvec![Some(1), Some(1)],
            smallvec![Some(1), Some(2)],
        ];
        assert_eq!(expected, second);
    }

    #[test]
    fn test_unsupported_volume() {
        let volume_graph = |configure: &dyn Fn(&mut SymbolicAccess)| {
            let mut graph = Graph::new("volume");
            let a = graph
                .add_container(Container::new("a", vec![Dimension::new("N", 4)], 8))
                .unwrap();
            let map = graph
                .add_map(None, "m", vec![Range::new("i", 0.0, 1.0)])
                .unwrap();
            let mut access = SymbolicAccess::new(a, AccessMode::Read, &["i"]);
            configure(&mut access);
            graph.add_computation(map, "c", vec![access]).unwrap();
            (graph, map)
        };

        // non-unit
        let (graph, map) = volume_graph(&|access| access.volume = SymbolicExpr::Number(4.0));
        assert_eq!(ErrorCode::UnsupportedVolume, run(&graph, map).unwrap_err().code);

        // unresolved
        let (graph, map) = volume_graph(&|access| access.volume = SymbolicExpr::parse("N"));
        assert_eq!(ErrorCode::UnsupportedVolume, run(&graph, map).unwrap_err().code);

        let (graph, map) = volume_graph(&|access| access.dynamic = true);
        assert_eq!(ErrorCode::UnsupportedVolume, run(&graph, map).unwrap_err().code);

        let (graph, map) = volume_graph(&|access| access.volume = SymbolicExpr::parse("2 - 1"));
        assert_eq!(2, run(&graph, map).unwrap().len());
    }

    #[test]
    fn test_iteration_limit() {
        let (graph, map, _) = matrix_graph(vec![Range::new("i", 0.0, 1e9)]);
        let config = SimulationConfig {
            max_trace_steps: 10,
            ..Default::default()
        };
        let err = MapSimulation::new(&graph, &config).run(map).unwrap_err();
        assert_eq!(ErrorCode::IterationLimit, err.code);
    }
}
