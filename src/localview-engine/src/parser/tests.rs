// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::*;
use crate::common::ErrorCode;

fn parse_stripped(input: &str) -> Expr {
    parse(input)
        .unwrap_or_else(|err| panic!("failed to parse '{input}': {err:?}"))
        .unwrap_or_else(|| panic!("empty AST for '{input}'"))
        .strip_loc()
}

fn num(s: &str) -> Expr {
    Expr::Const(s.to_string(), s.parse().unwrap(), Loc::default())
}

fn var(s: &str) -> Expr {
    Expr::Var(s.to_string(), Loc::default())
}

fn op2(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::Op2(op, Box::new(l), Box::new(r), Loc::default())
}

fn parse_err(input: &str) -> EquationError {
    match parse(input) {
        Err(mut errs) => errs.remove(0),
        Ok(ast) => panic!("expected error for '{input}', got {ast:?}"),
    }
}

#[test]
fn test_empty() {
    assert_eq!(Ok(None), parse(""));
    assert_eq!(Ok(None), parse("   "));
}

#[test]
fn test_precedence() {
    assert_eq!(
        op2(
            BinaryOp::Add,
            var("i"),
            op2(BinaryOp::Mul, num("2"), var("j"))
        ),
        parse_stripped("i + 2 * j")
    );
    assert_eq!(
        op2(
            BinaryOp::Mul,
            op2(BinaryOp::Add, var("i"), num("2")),
            var("j")
        ),
        parse_stripped("(i + 2) * j")
    );
    // subtraction is left associative
    assert_eq!(
        op2(
            BinaryOp::Sub,
            op2(BinaryOp::Sub, var("a"), var("b")),
            var("c")
        ),
        parse_stripped("a - b - c")
    );
}

#[test]
fn test_exponentiation() {
    assert_eq!(
        op2(
            BinaryOp::Exp,
            num("2"),
            op2(BinaryOp::Exp, num("3"), num("2"))
        ),
        parse_stripped("2^3**2")
    );
    assert_eq!(
        Expr::Op1(
            UnaryOp::Negative,
            Box::new(op2(BinaryOp::Exp, var("x"), num("2"))),
            Loc::default()
        ),
        parse_stripped("-x^2")
    );
    assert_eq!(
        op2(
            BinaryOp::Exp,
            num("2"),
            Expr::Op1(UnaryOp::Negative, Box::new(num("1")), Loc::default())
        ),
        parse_stripped("2^-1")
    );
}

#[test]
fn test_modulo() {
    assert_eq!(
        op2(BinaryOp::Mod, var("i"), num("4")),
        parse_stripped("i % 4")
    );
    assert_eq!(
        op2(BinaryOp::Mod, var("i"), num("4")),
        parse_stripped("i mod 4")
    );
}

#[test]
fn test_function_application() {
    assert_eq!(
        Expr::App(
            "min".to_string(),
            vec![var("N"), op2(BinaryOp::Add, var("i"), num("32"))],
            Loc::default()
        ),
        parse_stripped("Min(N, i + 32)")
    );
    assert_eq!(
        Expr::App("f".to_string(), vec![], Loc::default()),
        parse_stripped("f()")
    );
    assert_eq!(
        Expr::App("mod".to_string(), vec![var("i"), num("4")], Loc::default()),
        parse_stripped("mod(i, 4)")
    );
    // trailing comma is tolerated
    assert_eq!(
        Expr::App("floor".to_string(), vec![var("x")], Loc::default()),
        parse_stripped("floor(x,)")
    );
}

#[test]
fn test_locations() {
    let ast = parse("i + 10").unwrap().unwrap();
    assert_eq!(Loc::new(0, 6), ast.get_loc());

    let ast = parse("-(j)").unwrap().unwrap();
    assert_eq!(Loc::new(0, 3), ast.get_loc());
}

#[test]
fn test_errors() {
    let err = parse_err("i +");
    assert_eq!(ErrorCode::UnrecognizedEof, err.code);
    assert_eq!(3, err.start);

    let err = parse_err("i j");
    assert_eq!(ErrorCode::ExtraToken, err.code);
    assert_eq!((2, 3), (err.start, err.end));

    let err = parse_err("min(i, j");
    assert_eq!(ErrorCode::UnrecognizedEof, err.code);

    let err = parse_err("(i))");
    assert_eq!(ErrorCode::ExtraToken, err.code);

    let err = parse_err("i $ 2");
    assert_eq!(ErrorCode::UnrecognizedToken, err.code);

    let err = parse_err(".");
    assert_eq!(ErrorCode::ExpectedNumber, err.code);
}
