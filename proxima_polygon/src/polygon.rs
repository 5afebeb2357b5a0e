// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Point, Rect, Vec2};
use smallvec::SmallVec;

use crate::sat::is_point_inside;

/// A convex polygon in world space.
///
/// Vertices are kept in the order given; either winding works. Most hitboxes are
/// rectangles or low-count polygons, so up to eight vertices are stored inline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexPolygon {
    vertices: SmallVec<[Point; 8]>,
}

impl ConvexPolygon {
    /// Build a polygon from an ordered list of vertices.
    ///
    /// Convexity is not checked; concave input gives undefined (but non-panicking) answers.
    pub fn new(vertices: impl IntoIterator<Item = Point>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
        }
    }

    /// The four corners of `rect`, clockwise in a y-down coordinate system.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new([
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ])
    }

    /// Vertices in order.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Move every vertex by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        for v in &mut self.vertices {
            *v += delta;
        }
    }

    /// Smallest axis-aligned rectangle containing every vertex.
    ///
    /// An empty polygon yields [`Rect::ZERO`].
    pub fn bounding_box(&self) -> Rect {
        let mut iter = self.vertices.iter();
        let Some(&first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(Rect::from_points(first, first), |r, &p| r.union_pt(p))
    }

    /// Mean of the vertices.
    pub fn center(&self) -> Point {
        if self.vertices.is_empty() {
            return Point::ORIGIN;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        #[allow(
            clippy::cast_precision_loss,
            reason = "vertex counts are tiny compared to 2^52"
        )]
        let n = self.vertices.len() as f64;
        (sum / n).to_point()
    }

    /// Edge vectors, from each vertex to the next, closing back to the first.
    pub fn edges(&self) -> impl Iterator<Item = Vec2> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| self.vertices[(i + 1) % n] - self.vertices[i])
    }

    /// Whether `point` lies inside the polygon (even-odd rule).
    pub fn contains(&self, point: Point) -> bool {
        is_point_inside(self, point)
    }
}
