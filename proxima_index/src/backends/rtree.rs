// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree backend generic over scalar `T: Scalar` with SAH-like splits.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::error::ConfigError;
use crate::types::{Aabb2D, Scalar};

/// Default maximum children per node.
pub const DEFAULT_MAX_CHILDREN: usize = 9;
/// Default minimum children per node after a split.
pub const DEFAULT_MIN_CHILDREN: usize = 4;

/// R-tree backend using SAH-like splits and widened accumulator metrics.
///
/// Queries treat box edges as inclusive, so entries that merely touch the
/// query rectangle are reported. Nodes emptied by removals are recycled
/// through a free list, so long-running churn does not grow the arena.
#[derive(Clone)]
pub struct RTree<T: Scalar> {
    max_children: usize,
    min_children: usize,
    root: Option<NodeIdx>,
    arena: Arena<T>,
    // Current box of every live slot; also the key for pruned removals.
    slots: Vec<Option<Aabb2D<T>>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeIdx(usize);

#[derive(Clone, Debug)]
enum Children<T> {
    Leaf(Vec<(usize, Aabb2D<T>)>),
    Inner(Vec<NodeIdx>),
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self::Leaf(Vec::new())
    }
}

impl<T> Children<T> {
    fn len(&self) -> usize {
        match self {
            Self::Leaf(items) => items.len(),
            Self::Inner(kids) => kids.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
struct RNode<T> {
    bbox: Aabb2D<T>,
    children: Children<T>,
}

#[derive(Clone)]
struct Arena<T> {
    nodes: Vec<RNode<T>>,
    free: Vec<usize>,
}

impl<T: Scalar> Arena<T> {
    fn alloc(&mut self, children: Children<T>) -> NodeIdx {
        let bbox = self.bbox_of(&children).unwrap_or(Aabb2D::new(
            T::zero(),
            T::zero(),
            T::zero(),
            T::zero(),
        ));
        let node = RNode { bbox, children };
        if let Some(i) = self.free.pop() {
            self.nodes[i] = node;
            NodeIdx(i)
        } else {
            self.nodes.push(node);
            NodeIdx(self.nodes.len() - 1)
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        self.nodes[idx.0].children = Children::default();
        self.free.push(idx.0);
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }

    fn bbox_of(&self, children: &Children<T>) -> Option<Aabb2D<T>> {
        match children {
            Children::Leaf(items) => items.iter().map(|&(_, b)| b).reduce(|a, b| a.union(b)),
            Children::Inner(kids) => kids
                .iter()
                .map(|k| self.nodes[k.0].bbox)
                .reduce(|a, b| a.union(b)),
        }
    }

    fn refit(&mut self, idx: NodeIdx) {
        if let Some(bbox) = self.bbox_of(&self.nodes[idx.0].children) {
            self.nodes[idx.0].bbox = bbox;
        }
    }

    fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

impl<T: Scalar> Default for RTree<T> {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            min_children: DEFAULT_MIN_CHILDREN,
            root: None,
            arena: Arena {
                nodes: Vec::new(),
                free: Vec::new(),
            },
            slots: Vec::new(),
        }
    }
}

fn sort_by_axis<T: Scalar, E>(items: &mut [E], axis: usize, bbox_of: &impl Fn(&E) -> Aabb2D<T>) {
    items.sort_by(|a, b| {
        let (ax, ay) = bbox_of(a).centroid();
        let (bx, by) = bbox_of(b).centroid();
        let ord = if axis == 0 {
            ax.partial_cmp(&bx)
        } else {
            ay.partial_cmp(&by)
        };
        ord.unwrap_or(Ordering::Equal)
    });
}

fn running_union<T: Scalar>(boxes: impl Iterator<Item = Aabb2D<T>>) -> Vec<Aabb2D<T>> {
    let mut out: Vec<Aabb2D<T>> = Vec::new();
    for b in boxes {
        let next = match out.last() {
            Some(prev) => prev.union(b),
            None => b,
        };
        out.push(next);
    }
    out
}

/// SAH-like split of an overflowing child list into two halves.
fn sah_split<T: Scalar, E>(
    mut items: Vec<E>,
    min_children: usize,
    bbox_of: impl Fn(&E) -> Aabb2D<T>,
) -> (Vec<E>, Vec<E>) {
    let n = items.len();
    let lo = min_children.max(1);
    let hi = n.saturating_sub(lo);
    let mut best: Option<(T::Acc, usize, usize)> = None;
    for axis in 0..2 {
        sort_by_axis(&mut items, axis, &bbox_of);
        let prefix = running_union(items.iter().map(&bbox_of));
        let mut suffix = running_union(items.iter().rev().map(&bbox_of));
        suffix.reverse();
        for k in lo..=hi {
            let cost = prefix[k - 1].area() * T::acc_from_usize(k)
                + suffix[k].area() * T::acc_from_usize(n - k);
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, axis, k));
            }
        }
    }
    let (axis, k) = best.map_or((0, n / 2), |(_, axis, k)| (axis, k));
    sort_by_axis(&mut items, axis, &bbox_of);
    let right = items.split_off(k);
    (items, right)
}

/// Sort-tile-recursive grouping: tiles along x, then packs runs along y.
fn str_groups<T: Scalar, E: Clone>(
    items: &mut [E],
    max_children: usize,
    bbox_of: impl Fn(&E) -> Aabb2D<T>,
) -> Vec<Vec<E>> {
    let groups = items.len().div_ceil(max_children);
    let mut tiles = 1_usize;
    while tiles * tiles < groups {
        tiles += 1;
    }
    sort_by_axis(items, 0, &bbox_of);
    let slice_size = items.len().div_ceil(tiles).max(1);
    let mut out = Vec::with_capacity(groups);
    for slice in items.chunks_mut(slice_size) {
        sort_by_axis(slice, 1, &bbox_of);
        out.extend(slice.chunks(max_children).map(<[E]>::to_vec));
    }
    out
}

impl<T: Scalar> RTree<T> {
    /// Create an empty tree with an explicit node fan-out.
    ///
    /// `min_children` must be at least 1 and an overflowing node of
    /// `max_children + 1` entries must be splittable into two halves of at
    /// least `min_children` each.
    pub fn with_fanout(max_children: usize, min_children: usize) -> Result<Self, ConfigError> {
        if min_children == 0 {
            return Err(ConfigError::MinChildrenZero);
        }
        if max_children < 2 || 2 * min_children > max_children + 1 {
            return Err(ConfigError::MaxChildrenTooSmall {
                max_children,
                min_children,
            });
        }
        Ok(Self {
            max_children,
            min_children,
            ..Self::default()
        })
    }

    /// Maximum children per node.
    pub fn max_children(&self) -> usize {
        self.max_children
    }

    /// Minimum children per node after a split.
    pub fn min_children(&self) -> usize {
        self.min_children
    }

    fn ensure_slot(&mut self, slot: usize, bbox: Aabb2D<T>) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(bbox);
    }

    fn choose_child(&self, kids: &[NodeIdx], bbox: &Aabb2D<T>) -> Option<(usize, NodeIdx)> {
        let mut best: Option<(usize, T::Acc, T::Acc)> = None;
        for (i, k) in kids.iter().enumerate() {
            let cb = self.arena.nodes[k.0].bbox;
            let area = cb.area();
            let enlargement = cb.union(*bbox).area() - area;
            let better = match best {
                None => true,
                Some((_, be, ba)) => enlargement < be || (enlargement == be && area < ba),
            };
            if better {
                best = Some((i, enlargement, area));
            }
        }
        best.map(|(i, _, _)| (i, kids[i]))
    }

    /// Split an overflowing node in place; returns the new right sibling.
    fn split(&mut self, node: NodeIdx) -> NodeIdx {
        let min = self.min_children;
        let taken = core::mem::take(&mut self.arena.nodes[node.0].children);
        let (left, right) = match taken {
            Children::Leaf(items) => {
                let (l, r) = sah_split(items, min, |&(_, b)| b);
                (Children::Leaf(l), Children::Leaf(r))
            }
            Children::Inner(kids) => {
                let arena = &self.arena;
                let (l, r) = sah_split(kids, min, |k| arena.nodes[k.0].bbox);
                (Children::Inner(l), Children::Inner(r))
            }
        };
        self.arena.nodes[node.0].children = left;
        self.arena.refit(node);
        self.arena.alloc(right)
    }

    fn insert_item(&mut self, node: NodeIdx, slot: usize, bbox: Aabb2D<T>) -> Option<NodeIdx> {
        let descend = match &self.arena.nodes[node.0].children {
            Children::Leaf(_) => None,
            Children::Inner(kids) => self.choose_child(kids, &bbox),
        };
        let n = &mut self.arena.nodes[node.0];
        n.bbox = n.bbox.union(bbox);
        if let Some((pos, child)) = descend {
            let sibling = self.insert_item(child, slot, bbox)?;
            if let Children::Inner(kids) = &mut self.arena.nodes[node.0].children {
                kids.insert(pos + 1, sibling);
            }
        } else if let Children::Leaf(items) = &mut n.children {
            items.push((slot, bbox));
        } else {
            // Inner node left without children; turn it back into a leaf.
            n.children = Children::Leaf(alloc::vec![(slot, bbox)]);
            n.bbox = bbox;
        }
        (self.arena.nodes[node.0].children.len() > self.max_children).then(|| self.split(node))
    }

    fn remove_item(&mut self, node: NodeIdx, slot: usize, old: &Aabb2D<T>) -> bool {
        if !self.arena.nodes[node.0].bbox.overlaps(old) {
            return false;
        }
        let count = match &mut self.arena.nodes[node.0].children {
            Children::Leaf(items) => {
                let before = items.len();
                items.retain(|&(s, _)| s != slot);
                let removed = items.len() != before;
                if removed {
                    self.arena.refit(node);
                }
                return removed;
            }
            Children::Inner(kids) => kids.len(),
        };
        for pos in 0..count {
            let Children::Inner(kids) = &self.arena.nodes[node.0].children else {
                break;
            };
            let child = kids[pos];
            if self.remove_item(child, slot, old) {
                if self.arena.nodes[child.0].children.is_empty() {
                    if let Children::Inner(kids) = &mut self.arena.nodes[node.0].children {
                        kids.remove(pos);
                    }
                    self.arena.release(child);
                }
                self.arena.refit(node);
                return true;
            }
        }
        false
    }

    fn update_in_place(
        &mut self,
        node: NodeIdx,
        slot: usize,
        old: &Aabb2D<T>,
        new: Aabb2D<T>,
    ) -> bool {
        if !self.arena.nodes[node.0].bbox.overlaps(old) {
            return false;
        }
        let count = match &mut self.arena.nodes[node.0].children {
            Children::Leaf(items) => {
                let Some(item) = items.iter_mut().find(|(s, _)| *s == slot) else {
                    return false;
                };
                item.1 = new;
                self.arena.refit(node);
                return true;
            }
            Children::Inner(kids) => kids.len(),
        };
        for pos in 0..count {
            let Children::Inner(kids) = &self.arena.nodes[node.0].children else {
                break;
            };
            let child = kids[pos];
            if self.update_in_place(child, slot, old, new) {
                self.arena.refit(node);
                return true;
            }
        }
        false
    }

    /// Replace the whole tree with a packed STR build of `items`.
    fn bulk_build(&mut self, items: &[(usize, Aabb2D<T>)]) {
        self.arena.clear();
        for &(slot, bbox) in items {
            self.ensure_slot(slot, bbox);
        }
        let mut items = items.to_vec();
        let max = self.max_children;
        let mut level: Vec<NodeIdx> = str_groups(&mut items, max, |&(_, b)| b)
            .into_iter()
            .map(|g| self.arena.alloc(Children::Leaf(g)))
            .collect();
        while level.len() > 1 {
            let groups = {
                let arena = &self.arena;
                str_groups(&mut level, max, |k| arena.nodes[k.0].bbox)
            };
            level = groups
                .into_iter()
                .map(|g| self.arena.alloc(Children::Inner(g)))
                .collect();
        }
        self.root = level.first().copied();
    }
}

impl<T: Scalar> Backend<T> for RTree<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        self.ensure_slot(slot, aabb);
        match self.root {
            None => {
                let leaf = self.arena.alloc(Children::Leaf(alloc::vec![(slot, aabb)]));
                self.root = Some(leaf);
            }
            Some(root) => {
                if let Some(sibling) = self.insert_item(root, slot, aabb) {
                    let new_root = self
                        .arena
                        .alloc(Children::Inner(alloc::vec![root, sibling]));
                    self.root = Some(new_root);
                }
            }
        }
    }

    fn insert_bulk(&mut self, items: &[(usize, Aabb2D<T>)]) {
        // Small batches and non-empty trees fall back to repeated insertion.
        if self.root.is_none() && items.len() > self.max_children {
            self.bulk_build(items);
        } else {
            for &(slot, aabb) in items {
                self.insert(slot, aabb);
            }
        }
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        let Some(old) = self.slots.get(slot).copied().flatten() else {
            self.insert(slot, aabb);
            return;
        };
        if let Some(root) = self.root
            && self.update_in_place(root, slot, &old, aabb)
        {
            self.slots[slot] = Some(aabb);
            return;
        }
        self.remove(slot);
        self.insert(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        let Some(old) = self.slots.get_mut(slot).and_then(Option::take) else {
            return;
        };
        let Some(root) = self.root else {
            return;
        };
        if self.remove_item(root, slot, &old) && self.arena.nodes[root.0].children.is_empty() {
            self.root = None;
            self.arena.clear();
        }
    }

    fn visit_point<F: FnMut(usize)>(&self, x: T, y: T, f: F) {
        self.visit_rect(Aabb2D::from_point(x, y), f);
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = alloc::vec![root];
        while let Some(i) = stack.pop() {
            let n = &self.arena.nodes[i.0];
            if !n.bbox.overlaps(&rect) {
                continue;
            }
            match &n.children {
                Children::Leaf(items) => {
                    for &(slot, bbox) in items {
                        if bbox.overlaps(&rect) {
                            f(slot);
                        }
                    }
                }
                Children::Inner(kids) => stack.extend_from_slice(kids),
            }
        }
    }
}

impl<T: Scalar> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.slots.iter().filter(|e| e.is_some()).count();
        f.debug_struct("RTree")
            .field("max_children", &self.max_children)
            .field("min_children", &self.min_children)
            .field("live_nodes", &self.arena.live())
            .field("total_slots", &self.slots.len())
            .field("alive", &alive)
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}

/// R-tree with f32 coordinates and f64 metrics.
pub type RTreeF32 = RTree<f32>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64 = RTree<f64>;
