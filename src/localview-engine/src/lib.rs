// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub use localview_core::datamodel;

mod ast;
pub mod common;
mod parser;
mod token;

pub mod access_stack;
pub mod addressing;
pub mod analysis;
pub mod cache_line;
pub mod eval;
pub mod graph;
pub mod histogram;
pub mod map;
pub mod playback;
pub mod tiling;

#[cfg(any(test, feature = "testing"))]
pub mod test_common;

pub use self::access_stack::{AccessStack, COLD_MISS};
pub use self::addressing::{ConcreteIndex, Container, Index};
pub use self::analysis::{
    CellKey, CellStats, MapFailure, ReuseDistanceMetric, SimulationConfig, SimulationContext,
    SimulationResult, simulate,
};
pub use self::cache_line::{cache_line, line_key};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::eval::{Scope, SymbolicExpr, evaluate};
pub use self::graph::{ContainerId, Graph, NodeId, NodeKind};
pub use self::histogram::Histogram;
pub use self::map::{Access, AccessMap, MapTrace, TraceEntry};
pub use self::playback::Playback;
pub use self::tiling::{TilingRegion, border_markers, tiling_regions_for};
