// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::Serialize;
use smallvec::SmallVec;

use crate::common::Result;
use crate::datamodel;
pub use crate::datamodel::Dimension;
use crate::model_err;

/// A fully resolved multi-dimensional index.
pub type Index = SmallVec<[i64; 4]>;

/// An index as produced by evaluating symbolic subscripts: each component
/// is `None` when it could not be resolved under the current scope.
pub type ConcreteIndex = SmallVec<[Option<i64>; 4]>;

/// Compute strides for `shape` by folding cumulative products.
///
/// Row-major shapes get their unit stride last; `inverse` (column-major)
/// shapes get it first.  Each stride is named by the product of the
/// dimension names it spans.
pub fn strides(shape: &[Dimension], inverse: bool) -> Vec<Dimension> {
    let order: Vec<usize> = if inverse {
        (0..shape.len()).collect()
    } else {
        (0..shape.len()).rev().collect()
    };

    let mut strides = vec![Dimension::new("1", 1); shape.len()];
    let mut acc = Dimension::new("1", 1);
    for i in order {
        strides[i] = acc.clone();
        let name = if acc.value == 1 && acc.name == "1" {
            shape[i].name.clone()
        } else if inverse {
            format!("{}*{}", acc.name, shape[i].name)
        } else {
            format!("{}*{}", shape[i].name, acc.name)
        };
        acc = Dimension {
            name,
            value: acc.value * shape[i].value,
        };
    }
    strides
}

/// A named, shaped memory region and its addressing model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Container {
    pub name: String,
    pub shape: Vec<Dimension>,
    pub strides: Vec<Dimension>,
    /// bytes per element
    pub element_size: i64,
    pub base_offset: i64,
    pub alignment: i64,
    pub column_major: bool,
    /// display only, e.g. "Global" or "Register"
    pub storage: Option<String>,
}

impl Container {
    /// A row-major container starting at offset 0 with no alignment
    /// constraint.
    pub fn new(name: &str, shape: Vec<Dimension>, element_size: i64) -> Self {
        let strides = strides(&shape, false);
        Container {
            name: name.to_owned(),
            shape,
            strides,
            element_size,
            base_offset: 0,
            alignment: 0,
            column_major: false,
            storage: None,
        }
    }

    pub fn column_major(mut self) -> Self {
        self.column_major = true;
        self.strides = strides(&self.shape, true);
        self
    }

    pub fn with_base_offset(mut self, base_offset: i64) -> Self {
        self.base_offset = base_offset;
        self
    }

    pub fn with_alignment(mut self, alignment: i64) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_storage(mut self, storage: &str) -> Self {
        self.storage = Some(storage.to_owned());
        self
    }

    /// Replace the derived strides with ones known from the source program.
    pub fn with_strides(mut self, strides: Vec<Dimension>) -> Result<Self> {
        if strides.len() != self.shape.len() {
            return model_err!(
                MismatchedDimensions,
                format!(
                    "container '{}' has {} dimensions but {} strides",
                    self.name,
                    self.shape.len(),
                    strides.len()
                )
            );
        }
        self.strides = strides;
        Ok(self)
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn size(&self) -> i64 {
        self.shape.iter().map(|d| d.value).product()
    }

    /// The byte address of element 0: the base offset rounded up to the
    /// alignment (an alignment of 0 or 1 means unconstrained).
    pub fn start_address(&self) -> i64 {
        if self.alignment > 1 {
            let rem = self.base_offset.rem_euclid(self.alignment);
            if rem == 0 {
                self.base_offset
            } else {
                self.base_offset + self.alignment - rem
            }
        } else {
            self.base_offset
        }
    }

    /// `Σ idx[i] * strides[i]`, in elements, or `None` if it overflows.
    pub fn element_offset(&self, index: &[i64]) -> Option<i64> {
        if index.len() != self.strides.len() {
            return None;
        }
        index
            .iter()
            .zip(self.strides.iter())
            .try_fold(0i64, |acc, (i, stride)| {
                i.checked_mul(stride.value)?.checked_add(acc)
            })
    }

    /// The byte address of `index`, or `None` if it overflows.
    pub fn flat_index(&self, index: &[i64]) -> Option<i64> {
        self.element_offset(index)?
            .checked_mul(self.element_size)?
            .checked_add(self.start_address())
    }

    pub fn contains(&self, index: &[i64]) -> bool {
        index.len() == self.shape.len()
            && index
                .iter()
                .zip(self.shape.iter())
                .all(|(i, dim)| *i >= 0 && *i < dim.value)
    }

    /// Turn a concrete index into a resolved one, if every component
    /// resolved and the arity matches.
    pub fn resolve(&self, index: &[Option<i64>]) -> Option<Index> {
        if index.len() != self.rank() {
            return None;
        }
        index.iter().copied().collect()
    }

    /// Invert the stride mapping: reconstruct the index whose element
    /// offset is `offset`.  Returns `None` for negative offsets and for
    /// reconstructions that fall outside the shape.
    pub fn unflatten(&self, offset: i64) -> Option<Index> {
        if offset < 0 {
            return None;
        }

        let rank = self.rank();
        let order: SmallVec<[usize; 4]> = if self.column_major {
            (0..rank).rev().collect()
        } else {
            (0..rank).collect()
        };

        let mut index: Index = SmallVec::from_elem(0, rank);
        let mut rem = offset;
        for pos in order {
            let stride = self.strides[pos].value;
            if stride <= 0 {
                return None;
            }
            index[pos] = rem / stride;
            rem %= stride;
        }

        if rem != 0 || !self.contains(&index) {
            return None;
        }
        Some(index)
    }
}

impl TryFrom<&datamodel::Container> for Container {
    type Error = crate::common::Error;

    fn try_from(desc: &datamodel::Container) -> Result<Self> {
        if desc.element_size <= 0 {
            return model_err!(
                BadElementSize,
                format!(
                    "container '{}' has element size {}",
                    desc.name, desc.element_size
                )
            );
        }
        if let Some(dim) = desc.shape.iter().find(|dim| dim.value < 0) {
            return model_err!(
                MismatchedDimensions,
                format!(
                    "container '{}' has negative dimension {}={}",
                    desc.name, dim.name, dim.value
                )
            );
        }

        let mut container = Container::new(&desc.name, desc.shape.clone(), desc.element_size)
            .with_base_offset(desc.base_offset)
            .with_alignment(desc.alignment);
        if desc.column_major {
            container = container.column_major();
        }
        if let Some(storage) = &desc.storage {
            container = container.with_storage(storage);
        }
        if let Some(strides) = &desc.strides {
            container = container.with_strides(strides.clone())?;
        }
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use proptest::prelude::*;
    use smallvec::smallvec;

    fn shape(dims: &[(&str, i64)]) -> Vec<Dimension> {
        dims.iter()
            .map(|(name, value)| Dimension::new(name, *value))
            .collect()
    }

    fn stride_values(container: &Container) -> Vec<i64> {
        container.strides.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_row_major_strides() {
        let c = Container::new("A", shape(&[("N", 2), ("M", 3), ("K", 4)]), 8);
        assert_eq!(vec![12, 4, 1], stride_values(&c));
        let names: Vec<&str> = c.strides.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(vec!["M*K", "K", "1"], names);
        assert_eq!(24, c.size());
    }

    #[test]
    fn test_column_major_strides() {
        let c = Container::new("A", shape(&[("N", 2), ("M", 3), ("K", 4)]), 8).column_major();
        assert_eq!(vec![1, 2, 6], stride_values(&c));
        let names: Vec<&str> = c.strides.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(vec!["1", "N", "N*M"], names);
    }

    #[test]
    fn test_scalar_container() {
        let c = Container::new("s", vec![], 4);
        assert!(c.strides.is_empty());
        assert_eq!(1, c.size());
        assert_eq!(Some(0), c.flat_index(&[]));
        assert_eq!(Some(smallvec![]), c.unflatten(0));
        assert_eq!(None, c.unflatten(1));
    }

    #[test]
    fn test_flat_index_1d() {
        let c = Container::new("x", shape(&[("N", 10)]), 4).with_base_offset(64);
        for i in 0..10 {
            assert_eq!(Some(64 + i * 4), c.flat_index(&[i]));
        }
        // arity mismatch is "don't know", not a panic
        assert_eq!(None, c.flat_index(&[1, 2]));
    }

    #[test]
    fn test_alignment() {
        let c = Container::new("x", shape(&[("N", 4)]), 8)
            .with_base_offset(20)
            .with_alignment(16);
        assert_eq!(32, c.start_address());
        assert_eq!(Some(40), c.flat_index(&[1]));

        let aligned = Container::new("y", shape(&[("N", 4)]), 8)
            .with_base_offset(32)
            .with_alignment(16);
        assert_eq!(32, aligned.start_address());

        let unconstrained = Container::new("z", shape(&[("N", 4)]), 8)
            .with_base_offset(3)
            .with_alignment(1);
        assert_eq!(3, unconstrained.start_address());
    }

    #[test]
    fn test_unflatten_bounds() {
        let c = Container::new("A", shape(&[("N", 2), ("M", 3)]), 8);
        assert_eq!(Some(smallvec![1, 2]), c.unflatten(5));
        assert_eq!(None, c.unflatten(6));
        assert_eq!(None, c.unflatten(-1));
    }

    #[test]
    fn test_overflow_is_unknown() {
        let c = Container::new("A", shape(&[("N", 2), ("M", 10)]), 8);
        assert_eq!(None, c.element_offset(&[1_000_000_000_000_000_000, 0]));
        assert_eq!(None, c.flat_index(&[i64::MAX / 10, 0]));
        assert_eq!(Some(10), c.element_offset(&[1, 0]));
    }

    #[test]
    fn test_explicit_padded_strides() {
        // rows padded to 4 elements: offsets 3, 7, ... are padding
        let c = Container::new("A", shape(&[("N", 2), ("M", 3)]), 8)
            .with_strides(vec![Dimension::new("4", 4), Dimension::new("1", 1)])
            .unwrap();
        assert_eq!(Some(5), c.element_offset(&[1, 1]));
        assert_eq!(Some(smallvec![1, 1]), c.unflatten(5));
        assert_eq!(None, c.unflatten(3));
    }

    #[test]
    fn test_with_strides_mismatch() {
        let err = Container::new("A", shape(&[("N", 2), ("M", 3)]), 8)
            .with_strides(vec![Dimension::new("1", 1)])
            .unwrap_err();
        assert_eq!(ErrorCode::MismatchedDimensions, err.code);
    }

    #[test]
    fn test_resolve() {
        let c = Container::new("A", shape(&[("N", 2), ("M", 3)]), 8);
        assert_eq!(Some(smallvec![1, 2]), c.resolve(&[Some(1), Some(2)]));
        assert_eq!(None, c.resolve(&[Some(1), None]));
        assert_eq!(None, c.resolve(&[Some(1)]));
        // resolving does not bounds-check
        assert_eq!(Some(smallvec![5, 2]), c.resolve(&[Some(5), Some(2)]));
        assert!(!c.contains(&[5, 2]));
    }

    #[test]
    fn test_from_datamodel() {
        let desc = datamodel::Container {
            name: "B".to_owned(),
            shape: shape(&[("N", 3), ("M", 2)]),
            strides: None,
            element_size: 4,
            base_offset: 8,
            alignment: 0,
            column_major: true,
            storage: Some("Register".to_owned()),
        };
        let c = Container::try_from(&desc).unwrap();
        assert_eq!(vec![1, 3], stride_values(&c));
        assert_eq!(Some("Register".to_owned()), c.storage);
        assert_eq!(Some(8 + 4 * 4), c.flat_index(&[1, 1]));

        let bad = datamodel::Container {
            element_size: 0,
            ..desc
        };
        let err = Container::try_from(&bad).unwrap_err();
        assert_eq!(ErrorCode::BadElementSize, err.code);
    }

    fn container_strategy() -> impl Strategy<Value = Container> {
        (prop::collection::vec(1i64..6, 1..4), any::<bool>()).prop_map(|(dims, inverse)| {
            let shape = dims
                .iter()
                .enumerate()
                .map(|(i, v)| Dimension::new(&format!("d{i}"), *v))
                .collect();
            let c = Container::new("A", shape, 8);
            if inverse { c.column_major() } else { c }
        })
    }

    proptest! {
        #[test]
        fn unflatten_inverts_element_offset(c in container_strategy()) {
            for offset in 0..c.size() {
                let index = c.unflatten(offset).expect("offset within the shape");
                prop_assert!(c.contains(&index));
                prop_assert_eq!(Some(offset), c.element_offset(&index));
            }
            prop_assert_eq!(None, c.unflatten(c.size()));
        }
    }
}
