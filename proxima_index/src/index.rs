// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::{FlatVec, RTreeF64};
use crate::damage::Damage;
use crate::error::ConfigError;
use crate::types::Aabb2D;

/// Generational handle for entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are intentionally 32-bit; higher bits are truncated by design."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    generation: u32,
    aabb: Aabb2D<T>,
    payload: P,
    mark: Option<Mark>,
    // Last committed box, kept while an update is pending.
    prev_aabb: Option<Aabb2D<T>>,
}

/// A generic AABB index parameterized by a spatial backend.
///
/// Inserts, updates and removals are recorded immediately but only reach the
/// backend on [`commit`][Self::commit]; queries always see the last committed
/// state.
#[derive(Debug)]
pub struct IndexGeneric<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T>> {
    entries: Vec<Option<Entry<T, P>>>,
    // Last generation per slot, persists across frees.
    generations: Vec<u32>,
    free_list: Vec<usize>,
    // Slots marked since the last commit (may contain duplicates or freed slots).
    pending: Vec<usize>,
    committed: usize,
    backend: B,
}

impl<T, P, B> Default for IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    fn default() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T>,
{
    /// Create an empty index using an explicit backend instance.
    ///
    /// This is useful when higher layers want to choose a backend type or
    /// configure it before wiring it into the index.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            pending: Vec::new(),
            committed: 0,
            backend,
        }
    }

    /// Number of entries currently visible to queries (as of the last commit).
    pub fn len(&self) -> usize {
        self.committed
    }

    /// True if no committed entry exists.
    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generations[idx] = self.generations[idx].wrapping_add(1);
            idx
        } else {
            self.entries.push(None);
            self.generations.push(1);
            self.entries.len() - 1
        };
        let generation = self.generations[idx];
        self.entries[idx] = Some(Entry {
            generation,
            aabb,
            payload,
            mark: Some(Mark::Added),
            prev_aabb: None,
        });
        self.pending.push(idx);
        Key::new(idx, generation)
    }

    /// Update an existing AABB. Stale keys and entries pending removal are
    /// ignored.
    pub fn update(&mut self, key: Key, aabb: Aabb2D<T>) {
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        if e.mark == Some(Mark::Removed) {
            return;
        }
        let newly_marked = e.mark.is_none();
        if newly_marked {
            e.prev_aabb = Some(e.aabb);
        }
        e.aabb = aabb;
        e.mark = Some(match e.mark {
            Some(Mark::Added) => Mark::Added,
            _ => Mark::Updated,
        });
        if newly_marked {
            self.pending.push(key.idx());
        }
    }

    /// Remove an existing AABB. Stale keys are ignored.
    ///
    /// An entry inserted and removed between two commits never reaches the
    /// backend.
    pub fn remove(&mut self, key: Key) {
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        match e.mark {
            Some(Mark::Added) => {
                self.entries[key.idx()] = None;
                self.free_list.push(key.idx());
            }
            Some(Mark::Updated) => {
                // Report the box the backend still holds.
                if let Some(prev) = e.prev_aabb.take() {
                    e.aabb = prev;
                }
                e.mark = Some(Mark::Removed);
            }
            Some(Mark::Removed) => {}
            None => {
                e.mark = Some(Mark::Removed);
                self.pending.push(key.idx());
            }
        }
    }

    /// The AABB and payload recorded for `key`, including uncommitted changes.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        if e.generation != key.1 || e.mark == Some(Mark::Removed) {
            return None;
        }
        Some((e.aabb, e.payload))
    }

    /// Apply pending changes and compute batched damage. Also synchronizes backend state.
    ///
    /// Work is proportional to the number of entries touched since the
    /// previous commit. Newly added entries are handed to the backend as one
    /// batch.
    pub fn commit(&mut self) -> Damage<T> {
        let mut dmg = Damage::default();
        let mut added: Vec<(usize, Aabb2D<T>)> = Vec::new();
        for i in core::mem::take(&mut self.pending) {
            let Some(entry) = self.entries.get_mut(i).and_then(Option::as_mut) else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => {
                    added.push((i, entry.aabb));
                    dmg.added.push(entry.aabb);
                }
                Some(Mark::Removed) => {
                    self.backend.remove(i);
                    dmg.removed.push(entry.aabb);
                    self.entries[i] = None;
                    self.free_list.push(i);
                    self.committed -= 1;
                }
                Some(Mark::Updated) => {
                    self.backend.update(i, entry.aabb);
                    if let Some(prev) = entry.prev_aabb.take()
                        && prev != entry.aabb
                    {
                        dmg.moved.push((prev, entry.aabb));
                    }
                }
                None => {}
            }
        }
        if !added.is_empty() {
            self.committed += added.len();
            self.backend.insert_bulk(&added);
        }
        dmg
    }

    /// Query for entries whose AABB contains the point.
    pub fn query_point(&self, x: T, y: T) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut out = Vec::new();
        self.visit_point(x, y, |k, p| out.push((k, p)));
        out.into_iter()
    }

    /// Visit entries whose AABB contains the point (does not allocate result storage).
    ///
    /// Calls `f(key, payload)` for each match. The order is backend-dependent.
    pub fn visit_point<F: FnMut(Key, P)>(&self, x: T, y: T, mut f: F) {
        self.backend.visit_point(x, y, |i| {
            if let Some(Some(e)) = self.entries.get(i) {
                f(Key::new(i, e.generation), e.payload);
            }
        });
    }

    /// Query for entries whose AABB overlaps the given rectangle.
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut out = Vec::new();
        self.visit_rect(rect, |k, p| out.push((k, p)));
        out.into_iter()
    }

    /// Visit entries whose AABB overlaps the given rectangle (does not allocate result storage).
    ///
    /// Calls `f(key, payload)` for each match. The order is backend-dependent.
    pub fn visit_rect<F: FnMut(Key, P)>(&self, rect: Aabb2D<T>, mut f: F) {
        self.backend.visit_rect(rect, |i| {
            if let Some(Some(e)) = self.entries.get(i) {
                f(Key::new(i, e.generation), e.payload);
            }
        });
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<T, P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 {
            return None;
        }
        Some(e)
    }
}

/// Default index using a flat vector backend.
pub type Index<T, P> = IndexGeneric<T, P, FlatVec<T>>;

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Index<T, P> {
    /// Create an empty index backed by a flat vector.
    pub fn new() -> Self {
        Self::with_backend(FlatVec::default())
    }
}

impl<P: Copy + Debug> Index<f64, P> {
    /// Create an R-tree-backed index (f64 coordinates) with the default fan-out.
    pub fn with_rtree() -> IndexGeneric<f64, P, RTreeF64> {
        IndexGeneric::with_backend(RTreeF64::default())
    }

    /// Create an R-tree-backed index with an explicit node fan-out.
    pub fn with_rtree_fanout(
        max_children: usize,
        min_children: usize,
    ) -> Result<IndexGeneric<f64, P, RTreeF64>, ConfigError> {
        Ok(IndexGeneric::with_backend(RTreeF64::with_fanout(
            max_children,
            min_children,
        )?))
    }
}
