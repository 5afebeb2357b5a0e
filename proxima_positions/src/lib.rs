// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proxima Positions: per-type spatial indexes of object positions and the set queries built
//! on them.
//!
//! Every frame, a game loop reports objects that appeared, moved, or disappeared, then asks
//! questions about two lists of objects: which of them collide, which are within some
//! distance of each other, which contain a point. [`SpatialQueryEngine`] answers these.
//!
//! - Objects are read through the [`ObjectHandle`] trait. The engine snapshots their geometry
//!   into [`ObjectPosition`] records on refresh and never mutates them.
//! - One index (an R-tree from `proxima_index` by default) is created lazily per type tag.
//!   Broad-phase searches only visit the indexes of the types present in the other set.
//! - Changes are batched: `mark_object_as_*` only records intent and
//!   [`update`](SpatialQueryEngine::update), which every query runs first, applies it.
//! - Narrow-phase tests use the hitbox polygons with `proxima_polygon`.
//!
//! Queries take [`ObjectIdSet`]s and trim them in place to the ids that satisfied the
//! condition. The [`sets`] module converts between id sets and lists of objects.
//!
//! Nothing here fails at query time: ids with no record are skipped and an object without
//! hitboxes simply never collides. The only error is an invalid [`PositionsConfig`].
//!
//! ## Logging
//!
//! Refreshes, index creation, and skipped ids are reported through [`tracing`] at `trace`
//! and `debug` level. Install a subscriber in the application to see them.
//!
//! ## Features
//!
//! - `std` *(default)*: forwards to `kurbo/std`.
//! - `libm`: forwards to `kurbo/libm` for `no_std` builds.

#![no_std]

extern crate alloc;

mod config;
mod engine;
mod handle;
mod record;
pub mod sets;
mod tracker;

pub use config::{DistanceMetric, PositionsConfig};
pub use engine::{Counters, RefreshStats, Separation, SpatialQueryEngine};
pub use handle::{ObjectHandle, ObjectId};
pub use proxima_index::ConfigError;
pub use record::ObjectPosition;
pub use sets::{
    ObjectIdSet, keep_only_ids, keep_only_objects_from_grouped_ids, keep_only_objects_from_ids,
    object_ids_from_lists, remove_ids,
};
