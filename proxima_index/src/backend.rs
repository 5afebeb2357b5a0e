// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::types::Aabb2D;
use core::fmt::Debug;

/// Spatial backend abstraction used by [`IndexGeneric`][crate::IndexGeneric].
///
/// Backends only see opaque slot numbers; payloads and generations live in the
/// index that owns the backend.
pub trait Backend<T: Copy + PartialOrd + Debug> {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Insert many slots at once.
    ///
    /// The default implementation inserts one by one. Backends that can pack a
    /// batch better than repeated insertion (for example an empty R-tree)
    /// override this.
    fn insert_bulk(&mut self, items: &[(usize, Aabb2D<T>)]) {
        for &(slot, aabb) in items {
            self.insert(slot, aabb);
        }
    }

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Remove a slot from the spatial structure. Unknown slots are ignored.
    fn remove(&mut self, slot: usize);

    /// Visit slots whose AABB contains the point.
    fn visit_point<F: FnMut(usize)>(&self, x: T, y: T, f: F);

    /// Visit slots whose AABB overlaps the rectangle, edges included.
    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, f: F);

    /// Query slots whose AABB contains the point.
    ///
    /// The default implementation collects [`visit_point`][Backend::visit_point].
    fn query_point<'a>(&'a self, x: T, y: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        let mut out = Vec::new();
        self.visit_point(x, y, |i| out.push(i));
        Box::new(out.into_iter())
    }

    /// Query slots whose AABB overlaps the rectangle.
    ///
    /// The default implementation collects [`visit_rect`][Backend::visit_rect].
    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        let mut out = Vec::new();
        self.visit_rect(rect, |i| out.push(i));
        Box::new(out.into_iter())
    }
}
