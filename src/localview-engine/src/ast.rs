// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Loc {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Loc {
            start: start as u16,
            end: end as u16,
        }
    }

    /// The smallest span covering both `self` and `rhs`.
    pub fn union(&self, rhs: &Self) -> Self {
        Loc {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Exp,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Exp => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Expr is a parsed index or range expression.  Function names are
/// lowercased by the parser; whether a name is a known function is only
/// checked at evaluation time.
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(String, f64, Loc),
    Var(String, Loc),
    App(String, Vec<Expr>, Loc),
    Op1(UnaryOp, Box<Expr>, Loc),
    Op2(BinaryOp, Box<Expr>, Box<Expr>, Loc),
}

impl Expr {
    pub fn get_loc(&self) -> Loc {
        match self {
            Expr::Const(_, _, loc) => *loc,
            Expr::Var(_, loc) => *loc,
            Expr::App(_, _, loc) => *loc,
            Expr::Op1(_, _, loc) => *loc,
            Expr::Op2(_, _, _, loc) => *loc,
        }
    }

    /// The variable names this expression refers to.
    pub fn free_symbols(&self) -> BTreeSet<&str> {
        fn collect<'a>(expr: &'a Expr, out: &mut BTreeSet<&'a str>) {
            match expr {
                Expr::Const(_, _, _) => {}
                Expr::Var(name, _) => {
                    out.insert(name.as_str());
                }
                Expr::App(_, args, _) => {
                    for arg in args.iter() {
                        collect(arg, out);
                    }
                }
                Expr::Op1(_, l, _) => collect(l, out),
                Expr::Op2(_, l, r, _) => {
                    collect(l, out);
                    collect(r, out);
                }
            }
        }

        let mut symbols = BTreeSet::new();
        collect(self, &mut symbols);
        symbols
    }

    #[cfg(test)]
    pub(crate) fn strip_loc(self) -> Self {
        let loc = Loc::default();
        match self {
            Expr::Const(s, n, _loc) => Expr::Const(s, n, loc),
            Expr::Var(v, _loc) => Expr::Var(v, loc),
            Expr::App(func, args, _loc) => Expr::App(
                func,
                args.into_iter().map(|arg| arg.strip_loc()).collect(),
                loc,
            ),
            Expr::Op1(op, r, _loc) => Expr::Op1(op, Box::new(r.strip_loc()), loc),
            Expr::Op2(op, l, r, _loc) => {
                Expr::Op2(op, Box::new(l.strip_loc()), Box::new(r.strip_loc()), loc)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(s, _, _) => write!(f, "{s}"),
            Expr::Var(v, _) => write!(f, "{v}"),
            Expr::App(func, args, _) => {
                let args = args
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{func}({args})")
            }
            Expr::Op1(UnaryOp::Positive, r, _) => write!(f, "+{r}"),
            Expr::Op1(UnaryOp::Negative, r, _) => write!(f, "-{r}"),
            Expr::Op2(op, l, r, _) => write!(f, "({} {} {})", l, op.symbol(), r),
        }
    }
}

#[test]
fn test_free_symbols() {
    let expr = Expr::Op2(
        BinaryOp::Add,
        Box::new(Expr::Var("i".to_owned(), Loc::default())),
        Box::new(Expr::App(
            "min".to_owned(),
            vec![
                Expr::Var("N".to_owned(), Loc::default()),
                Expr::Const("2".to_owned(), 2.0, Loc::default()),
                Expr::Var("i".to_owned(), Loc::default()),
            ],
            Loc::default(),
        )),
        Loc::default(),
    );
    let symbols: Vec<&str> = expr.free_symbols().into_iter().collect();
    assert_eq!(vec!["N", "i"], symbols);
    assert_eq!("(i + min(N, 2, i))", expr.to_string());
}
