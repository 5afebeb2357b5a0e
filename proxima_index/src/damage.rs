// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coarse change summary produced by [`IndexGeneric::commit`][crate::IndexGeneric::commit].

use alloc::vec::Vec;

use crate::types::Aabb2D;

/// Boxes that entered, left, or moved within an index since the previous commit.
#[derive(Clone, Debug, PartialEq)]
pub struct Damage<T> {
    /// AABBs of entries inserted since the last commit.
    pub added: Vec<Aabb2D<T>>,
    /// AABBs of entries removed since the last commit (their last committed box).
    pub removed: Vec<Aabb2D<T>>,
    /// `(old, new)` pairs for entries whose AABB changed.
    pub moved: Vec<(Aabb2D<T>, Aabb2D<T>)>,
}

impl<T> Default for Damage<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            moved: Vec::new(),
        }
    }
}

impl<T> Damage<T> {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}
