// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Lexer for index and range expressions.
//!
//! The grammar is tiny: arithmetic operators, parentheses, commas,
//! identifiers (including the `mod` keyword) and numeric literals.  Spans
//! are byte offsets into the input.

use std::iter::Peekable;
use std::str::CharIndices;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_xid::UnicodeXID;

use crate::common::EquationError;
use crate::eqn_err;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'input> {
    Mod,
    Exp,
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
    Comma,
    Ident(&'input str),
    Num(&'input str),
}

/// `(start, token, end)`
pub type Spanned<T> = (usize, T, usize);

type LexResult<'input> = Result<Spanned<Token<'input>>, EquationError>;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?").unwrap();
}

fn single_char_token(c: char) -> Option<Token<'static>> {
    let tok = match c {
        '+' => Token::Plus,
        '-' => Token::Minus,
        '/' => Token::Div,
        '^' => Token::Exp,
        '%' => Token::Mod,
        '(' => Token::LParen,
        ')' => Token::RParen,
        ',' => Token::Comma,
        _ => return None,
    };
    Some(tok)
}

pub struct Lexer<'input> {
    text: &'input str,
    chars: Peekable<CharIndices<'input>>,
}

impl<'input> Lexer<'input> {
    pub fn new(text: &'input str) -> Self {
        Lexer {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    /// Skip input up to (not including) byte offset `end`.
    fn skip_to(&mut self, end: usize) {
        while self.chars.next_if(|&(i, _)| i < end).is_some() {}
    }

    fn ident(&mut self, start: usize) -> Spanned<Token<'input>> {
        let end = self.text[start..]
            .char_indices()
            .skip(1)
            .find(|&(_, c)| !UnicodeXID::is_xid_continue(c))
            .map_or(self.text.len(), |(i, _)| start + i);
        self.skip_to(end);

        let word = &self.text[start..end];
        let tok = if word == "mod" {
            Token::Mod
        } else {
            Token::Ident(word)
        };
        (start, tok, end)
    }

    fn number(&mut self, start: usize) -> LexResult<'input> {
        let len = match NUMBER.find(&self.text[start..]) {
            Some(m) => m.end(),
            None => {
                self.skip_to(start + 1);
                return eqn_err!(ExpectedNumber, start as u16, (start + 1) as u16);
            }
        };
        let end = start + len;
        self.skip_to(end);
        Ok((start, Token::Num(&self.text[start..end]), end))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = LexResult<'input>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}

        let &(start, c) = self.chars.peek()?;

        if c == '*' {
            self.chars.next();
            if self.chars.next_if(|&(_, c)| c == '*').is_some() {
                return Some(Ok((start, Token::Exp, start + 2)));
            }
            return Some(Ok((start, Token::Mul, start + 1)));
        }
        if let Some(tok) = single_char_token(c) {
            self.chars.next();
            return Some(Ok((start, tok, start + 1)));
        }
        if c == '_' || UnicodeXID::is_xid_start(c) {
            return Some(Ok(self.ident(start)));
        }
        if c.is_ascii_digit() || c == '.' {
            return Some(self.number(start));
        }

        self.chars.next();
        let end = start + c.len_utf8();
        Some(eqn_err!(UnrecognizedToken, start as u16, end as u16))
    }
}
