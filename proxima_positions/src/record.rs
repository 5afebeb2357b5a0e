// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};
use proxima_index::{Aabb2D, Key};
use proxima_polygon::ConvexPolygon;

use crate::handle::{ObjectHandle, ObjectId};

pub(crate) fn rect_to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

/// Snapshot of an object's geometry as of the last refresh.
///
/// Exactly one record exists per indexed object, and its [`aabb`](Self::aabb) is the box
/// currently stored for it in the index of its [`type_tag`](Self::type_tag).
#[derive(Clone, Debug)]
pub struct ObjectPosition {
    object_id: ObjectId,
    type_tag: Arc<str>,
    x: f64,
    y: f64,
    center: Point,
    hitboxes: Vec<ConvexPolygon>,
    aabb: Aabb2D<f64>,
    pub(crate) key: Key,
}

impl ObjectPosition {
    /// Snapshot `handle`, recording `aabb` as the box already stored under `key`.
    pub(crate) fn capture<H: ObjectHandle>(
        handle: &H,
        type_tag: Arc<str>,
        aabb: Aabb2D<f64>,
        key: Key,
    ) -> Self {
        let position = handle.position();
        Self {
            object_id: handle.id(),
            type_tag,
            x: position.x,
            y: position.y,
            center: handle.center(),
            hitboxes: handle.hitboxes(),
            aabb,
            key,
        }
    }

    /// Id of the object.
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Type tag the object is indexed under.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub(crate) fn type_tag_arc(&self) -> &Arc<str> {
        &self.type_tag
    }

    /// Position of the object's origin.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Center point.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Hitbox polygons.
    pub fn hitboxes(&self) -> &[ConvexPolygon] {
        &self.hitboxes
    }

    /// Bounding box stored in the index.
    pub fn aabb(&self) -> Aabb2D<f64> {
        self.aabb
    }

    /// Shift every part of the snapshot by `delta`. The index entry must be updated separately.
    pub(crate) fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        self.center += delta;
        self.aabb = self.aabb.translate(delta.x, delta.y);
        for hitbox in &mut self.hitboxes {
            hitbox.translate(delta);
        }
    }

    /// Whether any hitbox of `self` overlaps any hitbox of `other`.
    pub(crate) fn hitboxes_collide(&self, other: &Self, ignore_touching_edges: bool) -> bool {
        self.hitboxes.iter().any(|a| {
            other
                .hitboxes
                .iter()
                .any(|b| proxima_polygon::polygons_intersect(a, b, ignore_touching_edges))
        })
    }

    /// Sum of the separation vectors of every colliding hitbox pair, if any pair collides.
    pub(crate) fn separation_from(
        &self,
        other: &Self,
        ignore_touching_edges: bool,
    ) -> Option<Vec2> {
        let mut total = Vec2::ZERO;
        let mut moved = false;
        for a in &self.hitboxes {
            for b in &other.hitboxes {
                let result = proxima_polygon::collision_test(a, b, ignore_touching_edges);
                if result.collision {
                    total += result.move_axis;
                    moved = true;
                }
            }
        }
        moved.then_some(total)
    }

    pub(crate) fn contains_point(&self, point: Point, accurate: bool) -> bool {
        if accurate {
            self.hitboxes.iter().any(|h| h.contains(point))
        } else {
            self.aabb.contains_point(point.x, point.y)
        }
    }

    pub(crate) fn center_distance_squared(&self, other: &Self) -> f64 {
        (self.center - other.center).hypot2()
    }
}
