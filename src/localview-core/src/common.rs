// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // expression syntax
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    ExpectedNumber,
    // program construction
    DoesNotExist,
    DuplicateContainer,
    MismatchedDimensions,
    BadElementSize,
    BadNodeHandle,
    // simulation of a single map
    ZeroStep,
    UnsupportedVolume,
    IterationLimit,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnrecognizedEof => "unrecognized_eof",
            ErrorCode::UnrecognizedToken => "unrecognized_token",
            ErrorCode::ExtraToken => "extra_token",
            ErrorCode::ExpectedNumber => "expected_number",
            ErrorCode::DoesNotExist => "does_not_exist",
            ErrorCode::DuplicateContainer => "duplicate_container",
            ErrorCode::MismatchedDimensions => "mismatched_dimensions",
            ErrorCode::BadElementSize => "bad_element_size",
            ErrorCode::BadNodeHandle => "bad_node_handle",
            ErrorCode::ZeroStep => "zero_step",
            ErrorCode::UnsupportedVolume => "unsupported_volume",
            ErrorCode::IterationLimit => "iteration_limit",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lexing or parsing failure inside a single expression, with the
/// byte span it covers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

/// Whether an error came from building the program graph or from
/// simulating one of its maps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Model,
    Simulation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Model => "ModelError",
            ErrorKind::Simulation => "SimulationError",
        };
        write!(f, "{kind}{{{}", self.code)?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        f.write_str("}")
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
