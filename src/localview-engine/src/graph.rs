// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The program graph: an arena of map, computation and memory nodes.
//!
//! Nodes refer to each other (parent, children, adjacency) only through
//! [`NodeId`] handles, and accesses refer to containers through
//! [`ContainerId`] handles.  Expressions are parsed once, as nodes are
//! added, and the graph is not modified after it has been built.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::addressing::Container;
use crate::common::Result;
use crate::datamodel::{self, AccessMode, FreeSymbol, Program};
use crate::eval::SymbolicExpr;
use crate::model_err;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContainerId(u32);

impl ContainerId {
    #[cfg(test)]
    pub(crate) fn new(id: u32) -> Self {
        ContainerId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolicAccess {
    pub container: ContainerId,
    pub mode: AccessMode,
    pub index: Vec<SymbolicExpr>,
    pub volume: SymbolicExpr,
    /// data-dependent access count; never simulated
    pub dynamic: bool,
}

impl SymbolicAccess {
    pub fn new(container: ContainerId, mode: AccessMode, index: &[&str]) -> Self {
        SymbolicAccess {
            container,
            mode,
            index: index.iter().map(|s| SymbolicExpr::parse(s)).collect(),
            volume: SymbolicExpr::Number(1.0),
            dynamic: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    pub var: String,
    pub start: SymbolicExpr,
    pub end: SymbolicExpr,
    pub step: SymbolicExpr,
    pub free_symbol: Option<FreeSymbol>,
}

impl Range {
    /// `var` from `start` to `end` inclusive, with a step of 1.
    pub fn new(
        var: &str,
        start: impl Into<SymbolicExpr>,
        end: impl Into<SymbolicExpr>,
    ) -> Self {
        Range {
            var: var.to_owned(),
            start: start.into(),
            end: end.into(),
            step: SymbolicExpr::Number(1.0),
            free_symbol: None,
        }
    }

    pub fn with_step(mut self, step: impl Into<SymbolicExpr>) -> Self {
        self.step = step.into();
        self
    }

    pub fn with_free_symbol(mut self, name: &str, default: f64) -> Self {
        self.free_symbol = Some(FreeSymbol {
            name: name.to_owned(),
            default,
        });
        self
    }
}

impl From<&datamodel::Range> for Range {
    fn from(range: &datamodel::Range) -> Self {
        Range {
            var: range.var.clone(),
            start: SymbolicExpr::from(&range.start),
            end: SymbolicExpr::from(&range.end),
            step: SymbolicExpr::from(&range.step),
            free_symbol: range.free_symbol.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComputationNode {
    pub label: String,
    pub accesses: Vec<SymbolicAccess>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapNode {
    pub label: String,
    pub ranges: Vec<Range>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryNode {
    pub container: ContainerId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Computation(ComputationNode),
    Map(MapNode),
    Memory(MemoryNode),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// body, in evaluation order (maps only)
    pub children: Vec<NodeId>,
    /// adjacency between top-level maps and memory nodes
    pub edges: Vec<NodeId>,
}

impl Node {
    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Computation(comp) => &comp.label,
            NodeKind::Map(map) => &map.label,
            NodeKind::Memory(_) => "",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub name: String,
    containers: Vec<Container>,
    memory_nodes: Vec<NodeId>,
    container_names: HashMap<String, ContainerId>,
    nodes: Vec<Node>,
    /// default values for free symbols
    pub symbols: BTreeMap<String, f64>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Graph {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent,
            children: vec![],
            edges: vec![],
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    /// Register a container along with the memory node that stands for it.
    pub fn add_container(&mut self, container: Container) -> Result<ContainerId> {
        if self.container_names.contains_key(&container.name) {
            return model_err!(DuplicateContainer, container.name.clone());
        }
        let id = ContainerId(self.containers.len() as u32);
        let memory = self.push_node(NodeKind::Memory(MemoryNode { container: id }), None);
        self.container_names.insert(container.name.clone(), id);
        self.containers.push(container);
        self.memory_nodes.push(memory);
        Ok(id)
    }

    /// Add a map, either top-level (`parent` is `None`) or nested in the
    /// body of another map.
    pub fn add_map(
        &mut self,
        parent: Option<NodeId>,
        label: &str,
        ranges: Vec<Range>,
    ) -> Result<NodeId> {
        if let Some(parent) = parent {
            self.expect_map(parent)?;
        }
        let map = MapNode {
            label: label.to_owned(),
            ranges,
        };
        Ok(self.push_node(NodeKind::Map(map), parent))
    }

    pub fn add_computation(
        &mut self,
        parent: NodeId,
        label: &str,
        accesses: Vec<SymbolicAccess>,
    ) -> Result<NodeId> {
        self.expect_map(parent)?;
        let known = self.containers.len();
        if let Some(access) = accesses.iter().find(|a| a.container.index() >= known) {
            return model_err!(
                BadNodeHandle,
                format!(
                    "computation '{label}' accesses unknown container {}",
                    access.container
                )
            );
        }
        let comp = ComputationNode {
            label: label.to_owned(),
            accesses,
        };
        Ok(self.push_node(NodeKind::Computation(comp), Some(parent)))
    }

    /// Record that `a` and `b` are adjacent.  Connecting twice is a no-op.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        if self.node(a).is_none() || self.node(b).is_none() {
            return model_err!(BadNodeHandle, format!("cannot connect {a} and {b}"));
        }
        if !self.nodes[a.index()].edges.contains(&b) {
            self.nodes[a.index()].edges.push(b);
            self.nodes[b.index()].edges.push(a);
        }
        Ok(())
    }

    fn expect_map(&self, id: NodeId) -> Result<&MapNode> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Map(map)) => Ok(map),
            _ => model_err!(BadNodeHandle, format!("{id} is not a map")),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn map(&self, id: NodeId) -> Option<&MapNode> {
        self.expect_map(id).ok()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.edges.as_slice()).unwrap_or(&[])
    }

    pub fn top_level_maps(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.parent.is_none() && matches!(node.kind, NodeKind::Map(_)))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.index())
    }

    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers
            .iter()
            .enumerate()
            .map(|(i, c)| (ContainerId(i as u32), c))
    }

    pub fn container_by_name(&self, name: &str) -> Option<ContainerId> {
        self.container_names.get(name).copied()
    }

    pub fn memory_node_for(&self, id: ContainerId) -> Option<NodeId> {
        self.memory_nodes.get(id.index()).copied()
    }

    /// Every container accessed anywhere below `map`.
    pub fn containers_accessed(&self, map: NodeId) -> BTreeSet<ContainerId> {
        let mut found = BTreeSet::new();
        let mut pending = vec![map];
        while let Some(id) = pending.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if let NodeKind::Computation(comp) = &node.kind {
                found.extend(comp.accesses.iter().map(|a| a.container));
            }
            pending.extend(node.children.iter().copied());
        }
        found
    }

    fn add_program_map(&mut self, parent: Option<NodeId>, map: &datamodel::Map) -> Result<NodeId> {
        let ranges = map.ranges.iter().map(Range::from).collect();
        let id = self.add_map(parent, &map.label, ranges)?;
        for child in map.body.iter() {
            match child {
                datamodel::Node::Map(inner) => {
                    self.add_program_map(Some(id), inner)?;
                }
                datamodel::Node::Computation(comp) => {
                    let accesses = comp
                        .accesses
                        .iter()
                        .map(|a| self.symbolic_access(a))
                        .collect::<Result<Vec<_>>>()?;
                    self.add_computation(id, &comp.label, accesses)?;
                }
            }
        }
        Ok(id)
    }

    fn symbolic_access(&self, access: &datamodel::Access) -> Result<SymbolicAccess> {
        let Some(container) = self.container_by_name(&access.container) else {
            return model_err!(
                DoesNotExist,
                format!("unknown container '{}'", access.container)
            );
        };
        Ok(SymbolicAccess {
            container,
            mode: access.mode,
            index: access.index.iter().map(SymbolicExpr::from).collect(),
            volume: access
                .volume
                .as_ref()
                .map(SymbolicExpr::from)
                .unwrap_or(SymbolicExpr::Number(1.0)),
            dynamic: access.dynamic,
        })
    }
}

impl TryFrom<&Program> for Graph {
    type Error = crate::common::Error;

    fn try_from(program: &Program) -> Result<Self> {
        let mut graph = Graph::new(&program.name);
        graph.symbols = program.symbols.clone();

        for desc in program.containers.iter() {
            graph.add_container(Container::try_from(desc)?)?;
        }

        for map in program.maps.iter() {
            let id = graph.add_program_map(None, map)?;
            for container in graph.containers_accessed(id) {
                if let Some(memory) = graph.memory_node_for(container) {
                    graph.connect(id, memory)?;
                }
            }
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::Dimension;
    use crate::common::ErrorCode;

    fn vector(name: &str, n: i64) -> Container {
        Container::new(name, vec![Dimension::new("N", n)], 8)
    }

    #[test]
    fn test_build_by_hand() {
        let mut graph = Graph::new("copy");
        let a = graph.add_container(vector("a", 4)).unwrap();
        let b = graph.add_container(vector("b", 4)).unwrap();

        let map = graph
            .add_map(None, "copy", vec![Range::new("i", 0.0, 3.0)])
            .unwrap();
        let comp = graph
            .add_computation(
                map,
                "assign",
                vec![
                    SymbolicAccess::new(a, AccessMode::Read, &["i"]),
                    SymbolicAccess::new(b, AccessMode::Write, &["i"]),
                ],
            )
            .unwrap();

        assert_eq!(vec![map], graph.top_level_maps());
        assert_eq!(Some(map), graph.node(comp).and_then(|n| n.parent));
        assert_eq!(vec![comp], graph.node(map).unwrap().children);
        assert_eq!("assign", graph.node(comp).unwrap().label());
        assert_eq!(
            vec![a, b],
            graph.containers_accessed(map).into_iter().collect::<Vec<_>>()
        );

        let memory = graph.memory_node_for(a).unwrap();
        graph.connect(map, memory).unwrap();
        graph.connect(memory, map).unwrap();
        assert_eq!(&[memory], graph.neighbors(map));
        assert_eq!(&[map], graph.neighbors(memory));
    }

    #[test]
    fn test_bad_handles() {
        let mut graph = Graph::new("bad");
        let a = graph.add_container(vector("a", 4)).unwrap();
        let memory = graph.memory_node_for(a).unwrap();

        // computations only live inside maps
        let err = graph.add_computation(memory, "c", vec![]).unwrap_err();
        assert_eq!(ErrorCode::BadNodeHandle, err.code);

        let err = graph.add_map(Some(NodeId(99)), "m", vec![]).unwrap_err();
        assert_eq!(ErrorCode::BadNodeHandle, err.code);

        let map = graph.add_map(None, "m", vec![]).unwrap();
        let stray = SymbolicAccess::new(ContainerId(7), AccessMode::Read, &["0"]);
        let err = graph.add_computation(map, "c", vec![stray]).unwrap_err();
        assert_eq!(ErrorCode::BadNodeHandle, err.code);

        let err = graph.add_container(vector("a", 2)).unwrap_err();
        assert_eq!(ErrorCode::DuplicateContainer, err.code);
    }

    #[test]
    fn test_from_program() {
        let json = r#"{
            "name": "nested",
            "containers": [
                {"name": "A", "shape": [{"name": "N", "value": 2}, {"name": "M", "value": 3}]},
                {"name": "y", "shape": [{"name": "N", "value": 2}]},
                {"name": "unused", "shape": [{"name": "K", "value": 1}]}
            ],
            "maps": [{
                "label": "outer",
                "ranges": [{"var": "i", "start": 0, "end": "N - 1"}],
                "body": [{"map": {
                    "label": "inner",
                    "ranges": [{"var": "j", "start": 0, "end": 2}],
                    "body": [{"computation": {"label": "mac", "accesses": [
                        {"container": "A", "mode": "read", "index": ["i", "j"]},
                        {"container": "y", "mode": "read_write", "index": ["i"]}
                    ]}}]
                }}]
            }],
            "symbols": {"N": 2}
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        let graph = Graph::try_from(&program).unwrap();

        assert_eq!(Some(2.0), graph.symbols.get("N").copied());
        let maps = graph.top_level_maps();
        assert_eq!(1, maps.len());
        let outer = maps[0];
        assert_eq!("outer", graph.node(outer).unwrap().label());

        let inner = graph.node(outer).unwrap().children[0];
        let inner_map = graph.map(inner).unwrap();
        assert_eq!("j", inner_map.ranges[0].var);

        let a = graph.container_by_name("A").unwrap();
        let y = graph.container_by_name("y").unwrap();
        let unused = graph.container_by_name("unused").unwrap();
        let neighbors = graph.neighbors(outer);
        assert!(neighbors.contains(&graph.memory_node_for(a).unwrap()));
        assert!(neighbors.contains(&graph.memory_node_for(y).unwrap()));
        assert!(graph.neighbors(graph.memory_node_for(unused).unwrap()).is_empty());
        // nested maps are not adjacent to memory
        assert!(graph.neighbors(inner).is_empty());
    }

    #[test]
    fn test_unknown_container() {
        let program = Program {
            maps: vec![datamodel::Map {
                label: String::new(),
                ranges: vec![],
                body: vec![datamodel::Node::Computation(datamodel::Computation {
                    label: String::new(),
                    accesses: vec![datamodel::Access {
                        container: "ghost".to_owned(),
                        mode: AccessMode::Read,
                        index: vec![],
                        volume: None,
                        dynamic: false,
                    }],
                })],
            }],
            ..Default::default()
        };
        let err = Graph::try_from(&program).unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
        assert_eq!(Some("unknown container 'ghost'".to_owned()), err.get_details());
    }
}
