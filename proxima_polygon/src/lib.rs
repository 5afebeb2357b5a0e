// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Narrow-phase tests between convex polygons.
//!
//! This crate is the precise half of a broad-phase/narrow-phase pipeline: an index such as
//! `proxima_index` culls candidates by bounding box, then the hitbox polygons of each candidate
//! pair are checked here. Everything works in world coordinates on [`kurbo::Point`].
//!
//! - [`ConvexPolygon`] – an ordered vertex list (either winding) with
//!   [`translate`](ConvexPolygon::translate) and
//!   [`bounding_box`](ConvexPolygon::bounding_box).
//! - [`collision_test`] – separating-axis test returning a [`CollisionResult`] with the minimal
//!   translation that pushes the first polygon out of the second.
//! - [`polygons_intersect`] – the boolean form of [`collision_test`].
//! - [`is_point_inside`] – even-odd point-in-polygon test.
//!
//! Edge contact is configurable: with `ignore_touching_edges` set, polygons whose projections
//! only touch on some axis are reported as separate.
//!
//! # Example
//!
//! ```rust
//! use kurbo::{Point, Rect, Vec2};
//! use proxima_polygon::{ConvexPolygon, collision_test, polygons_intersect};
//!
//! let a = ConvexPolygon::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
//! let b = ConvexPolygon::from_rect(Rect::new(8.0, 0.0, 18.0, 10.0));
//!
//! let hit = collision_test(&a, &b, false);
//! assert!(hit.collision);
//! assert!((hit.move_axis - Vec2::new(-2.0, 0.0)).hypot() < 1e-9);
//!
//! let mut a = a;
//! a.translate(hit.move_axis);
//! assert!(!polygons_intersect(&a, &b, true));
//! assert!(a.contains(Point::new(0.0, 5.0)));
//! ```
//!
//! ## Features
//!
//! - `std` *(default)*: forwards to `kurbo/std`.
//! - `libm`: forwards to `kurbo/libm` for `no_std` builds.

#![no_std]

extern crate alloc;

mod polygon;
mod sat;

pub use polygon::ConvexPolygon;
pub use sat::{CollisionResult, collision_test, is_point_inside, polygons_intersect};
