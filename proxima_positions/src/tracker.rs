// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use hashbrown::{HashMap, HashSet};

use crate::handle::{ObjectHandle, ObjectId};

/// Changes accumulated between two refreshes.
///
/// Dirty objects are keyed by id, so the last mark for an id wins. Marking an object
/// created cancels a pending removal of the same id; marking it removed leaves any dirty
/// entry in place, and the removal wins when both are applied in one refresh.
#[derive(Debug)]
pub(crate) struct ChangeTracker<H> {
    dirty: HashMap<ObjectId, H>,
    removed: HashSet<ObjectId>,
}

impl<H> Default for ChangeTracker<H> {
    fn default() -> Self {
        Self {
            dirty: HashMap::new(),
            removed: HashSet::new(),
        }
    }
}

impl<H: ObjectHandle> ChangeTracker<H> {
    pub(crate) fn mark_created(&mut self, handle: H) {
        let id = handle.id();
        self.removed.remove(&id);
        self.dirty.insert(id, handle);
    }

    pub(crate) fn mark_dirty(&mut self, handle: H) {
        self.dirty.insert(handle.id(), handle);
    }

    pub(crate) fn mark_removed(&mut self, id: ObjectId) {
        self.removed.insert(id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dirty.is_empty() && self.removed.is_empty()
    }

    /// Hand over everything accumulated so far, leaving the tracker empty.
    pub(crate) fn take(&mut self) -> (HashMap<ObjectId, H>, HashSet<ObjectId>) {
        (
            core::mem::take(&mut self.dirty),
            core::mem::take(&mut self.removed),
        )
    }
}
