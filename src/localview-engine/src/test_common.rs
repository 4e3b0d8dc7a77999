// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Common test infrastructure for building test programs
//!
//! This module provides a builder-based API for creating programs that
//! can be used by unit tests and benchmarks.

use crate::analysis::{SimulationConfig, SimulationResult, simulate};
use crate::common::Result;
use crate::datamodel::{
    Access, AccessMode, Computation, Container, Dimension, FreeSymbol, Map, Node, Program, Range,
    Value,
};
use crate::graph::Graph;

/// Builder for test programs: containers first, then one or more
/// top-level maps whose bodies are filled in with `access` calls.
pub struct TestProgram {
    pub name: String,
    pub containers: Vec<Container>,
    pub maps: Vec<Map>,
    pub symbols: Vec<(String, f64)>,
}

impl TestProgram {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            containers: Vec::new(),
            maps: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// Add a row-major container with 8-byte elements
    pub fn container(mut self, name: &str, shape: &[(&str, i64)]) -> Self {
        self.containers.push(Container {
            name: name.to_string(),
            shape: shape.iter().map(|(n, v)| Dimension::new(n, *v)).collect(),
            strides: None,
            element_size: 8,
            base_offset: 0,
            alignment: 0,
            column_major: false,
            storage: None,
        });
        self
    }

    /// Adjust the most recently added container
    pub fn with_layout(mut self, element_size: i64, base_offset: i64, column_major: bool) -> Self {
        if let Some(c) = self.containers.last_mut() {
            c.element_size = element_size;
            c.base_offset = base_offset;
            c.column_major = column_major;
        }
        self
    }

    pub fn symbol(mut self, name: &str, value: f64) -> Self {
        self.symbols.push((name.to_string(), value));
        self
    }

    /// Start a new top-level map over `ranges`, each `(var, start, end)`
    /// with a step of 1
    pub fn map(mut self, label: &str, ranges: &[(&str, &str, &str)]) -> Self {
        self.maps.push(Map {
            label: label.to_string(),
            ranges: ranges
                .iter()
                .map(|(var, start, end)| Range {
                    var: var.to_string(),
                    start: Value::from(*start),
                    end: Value::from(*end),
                    step: Value::Number(1.0),
                    free_symbol: None,
                })
                .collect(),
            body: vec![],
        });
        self
    }

    /// Set the step of the last range of the current map
    pub fn step(mut self, step: &str) -> Self {
        if let Some(range) = self.maps.last_mut().and_then(|m| m.ranges.last_mut()) {
            range.step = Value::from(step);
        }
        self
    }

    /// Give the last range of the current map a free symbol default
    pub fn free_symbol(mut self, name: &str, default: f64) -> Self {
        if let Some(range) = self.maps.last_mut().and_then(|m| m.ranges.last_mut()) {
            range.free_symbol = Some(FreeSymbol {
                name: name.to_string(),
                default,
            });
        }
        self
    }

    /// Append an access to the current map's computation, creating the
    /// computation on first use
    pub fn access(mut self, container: &str, mode: AccessMode, index: &[&str]) -> Self {
        if let Some(map) = self.maps.last_mut() {
            if !matches!(map.body.last(), Some(Node::Computation(_))) {
                map.body.push(Node::Computation(Computation {
                    label: format!("{}_body", map.label),
                    accesses: vec![],
                }));
            }
            if let Some(Node::Computation(comp)) = map.body.last_mut() {
                comp.accesses.push(Access {
                    container: container.to_string(),
                    mode,
                    index: index.iter().map(|s| Value::from(*s)).collect(),
                    volume: None,
                    dynamic: false,
                });
            }
        }
        self
    }

    pub fn read(self, container: &str, index: &[&str]) -> Self {
        self.access(container, AccessMode::Read, index)
    }

    pub fn write(self, container: &str, index: &[&str]) -> Self {
        self.access(container, AccessMode::Write, index)
    }

    pub fn build_datamodel(&self) -> Program {
        Program {
            name: self.name.clone(),
            containers: self.containers.clone(),
            maps: self.maps.clone(),
            symbols: self.symbols.iter().cloned().collect(),
        }
    }

    pub fn build_graph(&self) -> Result<Graph> {
        Graph::try_from(&self.build_datamodel())
    }

    /// Build the graph and simulate it, panicking on model errors
    pub fn simulate(&self, config: &SimulationConfig) -> (Graph, SimulationResult) {
        let graph = self
            .build_graph()
            .unwrap_or_else(|err| panic!("failed to build '{}': {err}", self.name));
        let result = simulate(&graph, config);
        (graph, result)
    }
}
