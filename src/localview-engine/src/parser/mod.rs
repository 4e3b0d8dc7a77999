// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for index and range expressions.
//!
//! Precedence, loosest first: additive, multiplicative (including `%` and
//! `mod`), unary sign, exponentiation (right associative, `^` or `**`),
//! function application and atoms.

use crate::ast::{BinaryOp, Expr, Loc, UnaryOp};
use crate::common::EquationError;
use crate::eqn_err;
use crate::token::{Lexer, Spanned, Token};

#[cfg(test)]
mod tests;

type ParseResult<T> = Result<T, EquationError>;

fn additive_op(tok: &Token) -> Option<BinaryOp> {
    match tok {
        Token::Plus => Some(BinaryOp::Add),
        Token::Minus => Some(BinaryOp::Sub),
        _ => None,
    }
}

fn multiplicative_op(tok: &Token) -> Option<BinaryOp> {
    match tok {
        Token::Mul => Some(BinaryOp::Mul),
        Token::Div => Some(BinaryOp::Div),
        Token::Mod => Some(BinaryOp::Mod),
        _ => None,
    }
}

struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn new(input: &'input str) -> ParseResult<Self> {
        let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token<'input>> {
        self.tokens.get(self.pos).map(|(_, tok, _)| tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token<'input>> {
        self.tokens.get(self.pos + offset).map(|(_, tok, _)| tok)
    }

    fn bump(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied()?;
        self.pos += 1;
        Some(tok)
    }

    /// Consume the next token if it is `expected`.
    fn eat(&mut self, expected: Token<'input>) -> Option<Spanned<Token<'input>>> {
        if self.peek() == Some(&expected) {
            self.bump()
        } else {
            None
        }
    }

    fn expect(&mut self, expected: Token<'input>) -> ParseResult<Spanned<Token<'input>>> {
        match self.eat(expected) {
            Some(tok) => Ok(tok),
            None => self.unexpected(),
        }
    }

    fn unexpected<T>(&self) -> ParseResult<T> {
        match self.tokens.get(self.pos) {
            Some(&(start, _, end)) => eqn_err!(UnrecognizedToken, start as u16, end as u16),
            None => {
                let pos = self.tokens.last().map_or(0, |&(_, _, end)| end);
                eqn_err!(UnrecognizedEof, pos as u16, (pos + 1) as u16)
            }
        }
    }

    fn expression(&mut self) -> ParseResult<Option<Expr>> {
        if self.tokens.is_empty() {
            return Ok(None);
        }
        let expr = self.additive()?;
        if let Some(&(start, _, end)) = self.tokens.get(self.pos) {
            return eqn_err!(ExtraToken, start as u16, end as u16);
        }
        Ok(Some(expr))
    }

    /// Left-associative chain of operators selected by `op_for`, with
    /// operands parsed by `operand`.
    fn binary_chain(
        &mut self,
        op_for: fn(&Token) -> Option<BinaryOp>,
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut lhs = operand(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.bump();
            let rhs = operand(self)?;
            let loc = lhs.get_loc().union(&rhs.get_loc());
            lhs = Expr::Op2(op, Box::new(lhs), Box::new(rhs), loc);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        self.binary_chain(additive_op, Self::multiplicative)
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        self.binary_chain(multiplicative_op, Self::unary)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Positive,
            Some(Token::Minus) => UnaryOp::Negative,
            _ => return self.power(),
        };
        let Some((start, _, _)) = self.bump() else {
            return self.unexpected();
        };
        let operand = self.unary()?;
        let end = operand.get_loc().end as usize;
        Ok(Expr::Op1(op, Box::new(operand), Loc::new(start, end)))
    }

    /// `2^3^2` is `2^(3^2)`, and the exponent may carry a sign: `2^-1`.
    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.call()?;
        if self.eat(Token::Exp).is_none() {
            return Ok(base);
        }
        let exponent = self.unary()?;
        let loc = base.get_loc().union(&exponent.get_loc());
        Ok(Expr::Op2(BinaryOp::Exp, Box::new(base), Box::new(exponent), loc))
    }

    fn call(&mut self) -> ParseResult<Expr> {
        // `mod` is also an infix keyword, but `mod(a, b)` is a call
        let name = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(name)), Some(Token::LParen)) => name.to_lowercase(),
            (Some(Token::Mod), Some(Token::LParen)) => "mod".to_owned(),
            _ => return self.atom(),
        };
        let Some((start, _, _)) = self.bump() else {
            return self.unexpected();
        };
        self.bump();

        let mut args = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            args.push(self.additive()?);
            if self.eat(Token::Comma).is_none() {
                break;
            }
        }
        let (_, _, end) = self.expect(Token::RParen)?;

        Ok(Expr::App(name, args, Loc::new(start, end)))
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        if self.eat(Token::LParen).is_some() {
            let expr = self.additive()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        match self.tokens.get(self.pos).copied() {
            Some((start, Token::Num(text), end)) => {
                self.bump();
                match text.parse::<f64>() {
                    Ok(n) => Ok(Expr::Const(text.to_owned(), n, Loc::new(start, end))),
                    Err(_) => eqn_err!(ExpectedNumber, start as u16, end as u16),
                }
            }
            Some((start, Token::Ident(name), end)) => {
                self.bump();
                Ok(Expr::Var(name.to_owned(), Loc::new(start, end)))
            }
            _ => self.unexpected(),
        }
    }
}

/// Parse an expression string into an AST.
///
/// Empty (or all-whitespace) input gives `Ok(None)`.
pub fn parse(input: &str) -> Result<Option<Expr>, Vec<EquationError>> {
    Parser::new(input)
        .and_then(|mut parser| parser.expression())
        .map_err(|err| vec![err])
}
