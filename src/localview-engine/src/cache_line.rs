// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::addressing::{Container, Index};

/// The element-offset window `[first, last]` of the cache line holding
/// `index`, or `None` if grouping is disabled or the index is not a valid
/// element of `container`.
fn line_window(container: &Container, index: &[i64], line_bytes: i64) -> Option<(i64, i64)> {
    if line_bytes <= 0 || container.element_size <= 0 || !container.contains(index) {
        return None;
    }
    let target = container.element_offset(index)?;
    let address = container.flat_index(index)?;
    let esize = container.element_size;

    let bytes_before = address.rem_euclid(line_bytes);
    let before = bytes_before / esize;
    let after = ((line_bytes - bytes_before - esize).max(0)).div_euclid(esize);
    Some((target - before, target + after))
}

/// Every valid index sharing a cache line with `index`, in ascending
/// offset order and including `index` itself.  Empty when `line_bytes` is
/// not positive or `index` is out of bounds.
pub fn cache_line(container: &Container, index: &[i64], line_bytes: i64) -> Vec<Index> {
    let Some((first, last)) = line_window(container, index, line_bytes) else {
        return vec![];
    };
    (first.max(0)..=last)
        .filter_map(|offset| container.unflatten(offset))
        .collect()
}

/// The element offset identifying the line `index` lives on: where the
/// line's window starts, whether or not that offset is itself a valid
/// element, or the index's own offset when grouping is disabled.
pub fn line_key(container: &Container, index: &[i64], line_bytes: i64) -> Option<i64> {
    if !container.contains(index) {
        return None;
    }
    if line_bytes <= 0 || container.element_size <= 0 {
        return container.element_offset(index);
    }
    line_window(container, index, line_bytes).map(|(first, _)| first)
}
