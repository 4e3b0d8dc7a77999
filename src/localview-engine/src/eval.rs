// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Evaluation of symbolic index and range expressions under a concrete
//! binding of variable names to values.
//!
//! Evaluation never fails: anything that cannot be computed (an unbound
//! symbol, an unknown function, a non-finite intermediate) resolves to
//! `None`, and callers treat that as "don't know".

use std::collections::BTreeMap;
use std::fmt;

use float_cmp::approx_eq;
use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::EquationError;
use crate::datamodel::Value;
use crate::parser;

/// A binding of iteration variables and symbols to concrete values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(BTreeMap<String, f64>);

impl Scope {
    pub fn new() -> Self {
        Scope(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_owned(), value);
    }

    /// A copy of this scope with `name` bound to `value`.
    pub fn with(&self, name: &str, value: f64) -> Scope {
        let mut scope = self.clone();
        scope.insert(name, value);
        scope
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Scope {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Scope(iter.into_iter().collect())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bindings = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({bindings})")
    }
}

/// An expression as held by the graph: numbers stay numbers, strings are
/// parsed once up front.  Strings that fail to parse are kept around (for
/// display and diagnostics) and always evaluate to `None`.
#[derive(Clone, Debug, PartialEq)]
pub enum SymbolicExpr {
    Number(f64),
    Parsed(String, Expr),
    Invalid(String, Vec<EquationError>),
}

impl SymbolicExpr {
    pub fn parse(source: &str) -> SymbolicExpr {
        match parser::parse(source) {
            Ok(Some(ast)) => match ast {
                Expr::Const(_, n, _) => SymbolicExpr::Number(n),
                ast => SymbolicExpr::Parsed(source.to_owned(), ast),
            },
            Ok(None) => SymbolicExpr::Invalid(source.to_owned(), vec![]),
            Err(errs) => SymbolicExpr::Invalid(source.to_owned(), errs),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SymbolicExpr::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&[EquationError]> {
        match self {
            SymbolicExpr::Invalid(_, errs) => Some(errs),
            _ => None,
        }
    }

    /// The names this expression needs bound before it can resolve.
    pub fn free_symbols(&self) -> Vec<&str> {
        match self {
            SymbolicExpr::Parsed(_, ast) => ast.free_symbols().into_iter().collect(),
            _ => vec![],
        }
    }

    pub fn eval(&self, scope: &Scope) -> Option<f64> {
        match self {
            SymbolicExpr::Number(n) => Some(*n),
            SymbolicExpr::Parsed(_, ast) => eval_expr(ast, scope),
            SymbolicExpr::Invalid(_, _) => None,
        }
    }

    /// Evaluate to an integer index component; values that are not within
    /// a few ulps of an integer are unresolved.
    pub fn eval_index(&self, scope: &Scope) -> Option<i64> {
        self.eval(scope).and_then(to_integer)
    }
}

impl From<&Value> for SymbolicExpr {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => SymbolicExpr::Number(*n),
            Value::Expr(s) => SymbolicExpr::parse(s),
        }
    }
}

impl From<f64> for SymbolicExpr {
    fn from(n: f64) -> Self {
        SymbolicExpr::Number(n)
    }
}

impl From<&str> for SymbolicExpr {
    fn from(s: &str) -> Self {
        SymbolicExpr::parse(s)
    }
}

impl fmt::Display for SymbolicExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymbolicExpr::Number(n) => write!(f, "{n}"),
            SymbolicExpr::Parsed(source, _) => write!(f, "{source}"),
            SymbolicExpr::Invalid(source, _) => write!(f, "{source}"),
        }
    }
}

/// Evaluate a plain number or expression string under `scope`.
pub fn evaluate(value: &Value, scope: &Scope) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Expr(s) => SymbolicExpr::parse(s).eval(scope),
    }
}

pub fn to_integer(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if approx_eq!(f64, value, rounded, ulps = 4) && rounded.abs() < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn finite(value: f64) -> Option<f64> {
    if value.is_finite() { Some(value) } else { None }
}

fn eval_expr(expr: &Expr, scope: &Scope) -> Option<f64> {
    match expr {
        Expr::Const(_, n, _) => finite(*n),
        Expr::Var(name, _) => scope.get(name).and_then(finite),
        Expr::Op1(op, r, _) => {
            let r = eval_expr(r, scope)?;
            match op {
                UnaryOp::Positive => Some(r),
                UnaryOp::Negative => Some(-r),
            }
        }
        Expr::Op2(op, l, r, _) => {
            let l = eval_expr(l, scope)?;
            let r = eval_expr(r, scope)?;
            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Mod => l.rem_euclid(r),
                BinaryOp::Exp => l.powf(r),
            };
            finite(result)
        }
        Expr::App(func, args, _) => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, scope))
                .collect::<Option<Vec<f64>>>()?;
            finite(apply_builtin(func, &args)?)
        }
    }
}

fn apply_builtin(func: &str, args: &[f64]) -> Option<f64> {
    let result = match (func, args) {
        ("floor", [a]) => a.floor(),
        ("ceil" | "ceiling", [a]) => a.ceil(),
        ("abs", [a]) => a.abs(),
        ("min", [first, rest @ ..]) => rest.iter().fold(*first, |acc, v| acc.min(*v)),
        ("max", [first, rest @ ..]) => rest.iter().fold(*first, |acc, v| acc.max(*v)),
        ("mod", [a, b]) => a.rem_euclid(*b),
        ("int_floor", [a, b]) => (a / b).floor(),
        ("int_ceil", [a, b]) => (a / b).ceil(),
        _ => return None,
    };
    Some(result)
}
