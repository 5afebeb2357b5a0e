// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proxima Index: a generic 2D AABB index for broad-phase spatial queries.
//!
//! - Insert, update, and remove axis-aligned bounding boxes (AABBs) with small `Copy` payloads.
//! - Query by point or by overlapping rectangle. Box edges are inclusive, so touching boxes match.
//! - Batch changes with [`IndexGeneric::commit`] and receive coarse damage (added/removed/moved boxes).
//!   Entries added in one commit are handed to the backend as a single bulk load.
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! Higher layers compute world-space AABBs for their objects and feed them here.
//!
//! Backends are pluggable via the [`Backend`] trait. [`Index`] uses a flat vector (linear scan);
//! [`Index::with_rtree`] switches to an R-tree with SAH-like splits and a configurable fan-out.
//!
//! # Example
//!
//! ```rust
//! use proxima_index::{Aabb2D, Index};
//!
//! let mut idx: Index<f64, u32> = Index::new();
//! let k1 = idx.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), 1);
//! let _k2 = idx.insert(Aabb2D::new(5.0, 5.0, 15.0, 15.0), 2);
//! let _ = idx.commit();
//!
//! idx.update(k1, Aabb2D::new(20.0, 0.0, 30.0, 10.0));
//! let damage = idx.commit();
//! assert_eq!(damage.moved.len(), 1);
//!
//! let hits: Vec<_> = idx.query_point(6.0, 6.0).collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].1, 2);
//! ```
//!
//! An R-tree with the default fan-out (9 children, 4 after a split):
//!
//! ```rust
//! use proxima_index::{Aabb2D, ConfigError, Index};
//!
//! let mut idx = Index::<f64, u32>::with_rtree();
//! let _k = idx.insert(Aabb2D::new(0.0, 0.0, 100.0, 100.0), 1);
//! let _ = idx.commit();
//! assert_eq!(idx.query_rect(Aabb2D::new(100.0, 100.0, 120.0, 120.0)).count(), 1);
//!
//! assert_eq!(
//!     Index::<f64, u32>::with_rtree_fanout(3, 4).err(),
//!     Some(ConfigError::MaxChildrenTooSmall { max_children: 3, min_children: 4 })
//! );
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//! SAH metrics use widened accumulators to reduce precision pitfalls.

#![no_std]

extern crate alloc;

mod backend;
pub mod backends;
mod damage;
mod error;
mod index;
mod types;

pub use backend::Backend;
pub use damage::Damage;
pub use error::ConfigError;
pub use index::{Index, IndexGeneric, Key};
pub use types::{Aabb2D, Scalar, ScalarAcc};
