// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Separating-axis collision and point-in-polygon tests.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Vec2};

use crate::polygon::ConvexPolygon;

/// Outcome of [`collision_test`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollisionResult {
    /// Whether the polygons overlap.
    pub collision: bool,
    /// Minimal translation to apply to the first polygon to separate it from the second.
    ///
    /// Zero when there is no collision, and also for polygons that only touch.
    pub move_axis: Vec2,
}

/// Project every vertex onto `axis` and return the covered interval.
fn project(poly: &ConvexPolygon, axis: Vec2) -> (f64, f64) {
    poly.vertices()
        .iter()
        .map(|v| v.to_vec2().dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}

/// Signed gap between two intervals; negative when they overlap.
fn interval_distance((min_a, max_a): (f64, f64), (min_b, max_b): (f64, f64)) -> f64 {
    if min_a < min_b {
        min_b - max_a
    } else {
        min_a - max_b
    }
}

/// Separating-axis test between two convex polygons.
///
/// Every edge normal of both polygons is tried as a separating axis. A positive gap on any
/// axis means no collision; so does a zero gap when `ignore_touching_edges` is set. Otherwise
/// the axis with the smallest overlap becomes the [`move_axis`](CollisionResult::move_axis),
/// oriented from `p2` towards `p1` and scaled by the overlap.
///
/// Polygons with no vertices never collide. Degenerate (zero-length) edges are skipped.
pub fn collision_test(
    p1: &ConvexPolygon,
    p2: &ConvexPolygon,
    ignore_touching_edges: bool,
) -> CollisionResult {
    let none = CollisionResult::default();
    if p1.is_empty() || p2.is_empty() {
        return none;
    }

    let mut min_dist = f64::INFINITY;
    let mut best_axis = None;
    for edge in p1.edges().chain(p2.edges()) {
        let len = edge.hypot();
        if len == 0.0 {
            continue;
        }
        let axis = Vec2::new(-edge.y, edge.x) / len;
        let dist = interval_distance(project(p1, axis), project(p2, axis));
        if dist > 0.0 || (dist == 0.0 && ignore_touching_edges) {
            return none;
        }
        let abs = dist.abs();
        if abs < min_dist {
            min_dist = abs;
            best_axis = Some(axis);
        }
    }

    let Some(mut axis) = best_axis else {
        return none;
    };
    let away = p1.center() - p2.center();
    if away.dot(axis) < 0.0 {
        axis = -axis;
    }
    CollisionResult {
        collision: true,
        move_axis: axis * min_dist,
    }
}

/// Whether `p1` and `p2` overlap; the boolean form of [`collision_test`].
pub fn polygons_intersect(
    p1: &ConvexPolygon,
    p2: &ConvexPolygon,
    ignore_touching_edges: bool,
) -> bool {
    collision_test(p1, p2, ignore_touching_edges).collision
}

/// Even-odd ray-crossing test for `point` against `poly`.
///
/// Points exactly on an edge may land on either side.
pub fn is_point_inside(poly: &ConvexPolygon, point: Point) -> bool {
    let v = poly.vertices();
    let mut inside = false;
    let mut j = v.len().wrapping_sub(1);
    for i in 0..v.len() {
        let (a, b) = (v[i], v[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
