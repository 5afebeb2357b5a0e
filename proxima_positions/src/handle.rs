// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only view of a live object, as consumed by the engine.

use alloc::rc::Rc;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect};
use proxima_polygon::ConvexPolygon;

/// Stable identifier of a live object.
///
/// Ids are unique for the lifetime of an object and may be reused once it is destroyed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Geometry of a live object, read by the engine on each refresh.
///
/// All geometry is in world space and must already reflect the object's current
/// transform. The engine only reads through this trait; it never mutates or frees the
/// object behind it.
pub trait ObjectHandle {
    /// Stable id of the object.
    fn id(&self) -> ObjectId;
    /// Kind of object (for example its class name). Objects are indexed per type tag.
    fn type_tag(&self) -> &str;
    /// Position of the object's origin.
    fn position(&self) -> Point;
    /// Center of the object, used by [`DistanceMetric::Centers`](crate::DistanceMetric::Centers).
    fn center(&self) -> Point;
    /// Hitbox polygons. An object without hitboxes never collides.
    fn hitboxes(&self) -> Vec<ConvexPolygon>;
    /// Axis-aligned bounding box.
    fn aabb(&self) -> Rect;
}

macro_rules! forward_handle {
    ($($ty:ty),*) => {$(
        impl<T: ObjectHandle + ?Sized> ObjectHandle for $ty {
            fn id(&self) -> ObjectId {
                (**self).id()
            }
            fn type_tag(&self) -> &str {
                (**self).type_tag()
            }
            fn position(&self) -> Point {
                (**self).position()
            }
            fn center(&self) -> Point {
                (**self).center()
            }
            fn hitboxes(&self) -> Vec<ConvexPolygon> {
                (**self).hitboxes()
            }
            fn aabb(&self) -> Rect {
                (**self).aabb()
            }
        }
    )*};
}

forward_handle!(&T, Rc<T>, Arc<T>);
