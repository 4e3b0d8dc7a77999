// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Descriptors for the programs handed to the engine.
//!
//! These mirror what the graph importer produces: containers with their
//! addressing parameters, and a tree of maps whose leaves are computations
//! carrying symbolic accesses.  Everything here is plain data; the engine
//! validates it when building its graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

fn is_zero_i64(val: &i64) -> bool {
    *val == 0
}

fn is_false(val: &bool) -> bool {
    !*val
}

fn is_empty_string(val: &str) -> bool {
    val.is_empty()
}

fn default_element_size() -> i64 {
    8
}

fn default_step() -> Value {
    Value::Number(1.0)
}

/// A range bound, index component or volume: either already a number, or
/// an expression over iteration variables and symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Expr(String),
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Expr(s.to_owned())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Expr(s) => write!(f, "{s}"),
        }
    }
}

/// A named size: the symbolic name from the source program and its
/// resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: i64,
}

impl Dimension {
    pub fn new(name: &str, value: i64) -> Self {
        Dimension {
            name: name.to_owned(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub shape: Vec<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub strides: Option<Vec<Dimension>>,
    #[serde(default = "default_element_size")]
    pub element_size: i64,
    #[serde(skip_serializing_if = "is_zero_i64", default)]
    pub base_offset: i64,
    #[serde(skip_serializing_if = "is_zero_i64", default)]
    pub alignment: i64,
    #[serde(skip_serializing_if = "is_false", default)]
    pub column_major: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::ReadWrite => "read_write",
        };
        write!(f, "{mode}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub container: String,
    pub mode: AccessMode,
    pub index: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<Value>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub dynamic: bool,
}

/// A symbol a range bound depends on, together with the value to assume
/// when nothing else binds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSymbol {
    pub name: String,
    pub default: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub var: String,
    pub start: Value,
    pub end: Value,
    #[serde(default = "default_step")]
    pub step: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub free_symbol: Option<FreeSymbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub label: String,
    pub accesses: Vec<Access>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub label: String,
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Map(Map),
    Computation(Computation),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub name: String,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub maps: Vec<Map>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub symbols: BTreeMap<String, f64>,
}
