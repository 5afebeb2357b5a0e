// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple, a reference oracle).
//! - `rtree`: generic R-tree (`T: Scalar`) with SAH-like splits and STR bulk loading
//!   (aliases: `RTreeF32`, `RTreeF64`).
//!
//! SAH note
//! --------
//! When a node overflows, its children are sorted by centroid along each axis
//! and we pick the split point `k` minimizing
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` bound the first `k` and remaining `n - k` children.
//! Prefix/suffix boxes make each axis O(n). Areas use the widened accumulator
//! (`f32`→`f64`).

pub(crate) mod flatvec;
pub(crate) mod rtree;

pub use flatvec::FlatVec;
pub use rtree::{DEFAULT_MAX_CHILDREN, DEFAULT_MIN_CHILDREN, RTree, RTreeF32, RTreeF64};
