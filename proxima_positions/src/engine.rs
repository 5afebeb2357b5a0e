// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine: position records, per-type indexes, refresh, and set queries.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use kurbo::{Point, Vec2};
use proxima_index::backends::RTreeF64;
use proxima_index::{Aabb2D, Backend, ConfigError, Damage, IndexGeneric};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::{DistanceMetric, PositionsConfig};
use crate::handle::{ObjectHandle, ObjectId};
use crate::record::{ObjectPosition, rect_to_aabb};
use crate::sets::{ObjectIdSet, keep_only_ids, remove_ids};
use crate::tracker::ChangeTracker;

type TypeIndex<B> = IndexGeneric<f64, ObjectId, B>;
type TypeTags = SmallVec<[Arc<str>; 4]>;

fn push_unique(tags: &mut TypeTags, tag: Arc<str>) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// What a refresh changed in the indexes.
///
/// An object whose type tag changed counts once as removed and once as inserted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Records added to an index.
    pub inserted: usize,
    /// Records whose bounding box changed.
    pub moved: usize,
    /// Records dropped from an index.
    pub removed: usize,
}

impl RefreshStats {
    fn absorb(&mut self, damage: &Damage<f64>) {
        self.inserted += damage.added.len();
        self.moved += damage.moved.len();
        self.removed += damage.removed.len();
    }

    /// True if the refresh changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Sizes of the engine's internal state, for profiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Number of per-type indexes created so far (they are never dropped).
    pub type_index_count: usize,
    /// Number of live position records.
    pub object_position_count: usize,
}

/// Displacement applied to one object by [`SpatialQueryEngine::separate_objects`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Separation {
    /// The moved object.
    pub object_id: ObjectId,
    /// Translation that was applied to its record.
    pub delta: Vec2,
}

/// Spatial index of object positions, grouped by type tag, answering set queries.
///
/// Geometry changes are reported with the `mark_object_as_*` methods and only picked up by
/// [`update`](Self::update), which every query calls first. Queries take two sets of ids and
/// trim them in place to the ids that satisfied the condition ("picking").
///
/// `H` is the handle type the engine keeps for dirty objects until the next refresh: a
/// borrow (`&T`), an `Rc<T>`, or anything else implementing [`ObjectHandle`]. `B` is the
/// spatial backend cloned for every type tag; it defaults to an R-tree.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use kurbo::{Point, Rect};
/// use proxima_polygon::ConvexPolygon;
/// use proxima_positions::{ObjectHandle, ObjectId, ObjectIdSet, SpatialQueryEngine};
///
/// struct Crate { id: u64, rect: Rect }
///
/// impl ObjectHandle for Crate {
///     fn id(&self) -> ObjectId { ObjectId(self.id) }
///     fn type_tag(&self) -> &str { "Crate" }
///     fn position(&self) -> Point { self.rect.origin() }
///     fn center(&self) -> Point { self.rect.center() }
///     fn hitboxes(&self) -> Vec<ConvexPolygon> { vec![ConvexPolygon::from_rect(self.rect)] }
///     fn aabb(&self) -> Rect { self.rect }
/// }
///
/// let a = Rc::new(Crate { id: 1, rect: Rect::new(0.0, 0.0, 10.0, 10.0) });
/// let b = Rc::new(Crate { id: 2, rect: Rect::new(5.0, 5.0, 15.0, 15.0) });
///
/// let mut engine = SpatialQueryEngine::new();
/// engine.mark_object_as_created(a.clone());
/// engine.mark_object_as_created(b.clone());
///
/// let mut set1: ObjectIdSet = [ObjectId(1)].into_iter().collect();
/// let mut set2: ObjectIdSet = [ObjectId(2)].into_iter().collect();
/// assert!(engine.collision_test(&mut set1, &mut set2, false, false));
/// assert!(set1.contains(&ObjectId(1)) && set2.contains(&ObjectId(2)));
/// ```
pub struct SpatialQueryEngine<H, B = RTreeF64>
where
    B: Backend<f64> + Clone,
{
    distance_metric: DistanceMetric,
    prototype: B,
    indexes: HashMap<Arc<str>, TypeIndex<B>>,
    positions: HashMap<ObjectId, ObjectPosition>,
    tracker: ChangeTracker<H>,
}

impl<H, B: Backend<f64> + Clone> fmt::Debug for SpatialQueryEngine<H, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialQueryEngine")
            .field("distance_metric", &self.distance_metric)
            .field("type_indexes", &self.indexes.len())
            .field("positions", &self.positions.len())
            .finish_non_exhaustive()
    }
}

impl<H: ObjectHandle> SpatialQueryEngine<H> {
    /// Create an engine with the default R-tree fan-out and box-based distances.
    pub fn new() -> Self {
        Self::with_backend(RTreeF64::default())
    }

    /// Create an engine from a [`PositionsConfig`], validating its R-tree fan-out.
    pub fn with_config(config: PositionsConfig) -> Result<Self, ConfigError> {
        let prototype = config.rtree()?;
        debug!(
            max_children = config.max_children,
            min_children = config.min_children,
            distance_metric = ?config.distance_metric,
            "building spatial query engine"
        );
        Ok(Self::with_backend(prototype).with_distance_metric(config.distance_metric))
    }
}

impl<H: ObjectHandle> Default for SpatialQueryEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ObjectHandle, B: Backend<f64> + Clone> SpatialQueryEngine<H, B> {
    /// Create an engine whose per-type indexes are clones of `prototype`.
    pub fn with_backend(prototype: B) -> Self {
        Self {
            distance_metric: DistanceMetric::default(),
            prototype,
            indexes: HashMap::new(),
            positions: HashMap::new(),
            tracker: ChangeTracker::default(),
        }
    }

    /// Use `metric` for [`distance_test`](Self::distance_test).
    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    /// Metric used by [`distance_test`](Self::distance_test).
    pub fn distance_metric(&self) -> DistanceMetric {
        self.distance_metric
    }

    /// Report a new object. Cancels a pending removal of the same id.
    pub fn mark_object_as_created(&mut self, object: H) {
        self.tracker.mark_created(object);
    }

    /// Report that an object moved or otherwise changed geometry.
    pub fn mark_object_as_dirty(&mut self, object: H) {
        self.tracker.mark_dirty(object);
    }

    /// Report that an object left the simulation.
    ///
    /// Takes effect on the next refresh, after any pending dirty mark for the same id.
    pub fn mark_object_as_removed(&mut self, object: &impl ObjectHandle) {
        self.tracker.mark_removed(object.id());
    }

    /// Record of `id` as of the last refresh.
    pub fn position(&self, id: ObjectId) -> Option<&ObjectPosition> {
        self.positions.get(&id)
    }

    /// Sizes of the internal state.
    pub fn counters(&self) -> Counters {
        Counters {
            type_index_count: self.indexes.len(),
            object_position_count: self.positions.len(),
        }
    }

    /// Shared tag for `tag`, creating its index on first use.
    fn intern(&mut self, tag: &str) -> Arc<str> {
        if let Some((key, _)) = self.indexes.get_key_value(tag) {
            return Arc::clone(key);
        }
        trace!(type_tag = tag, "creating type index");
        let key: Arc<str> = Arc::from(tag);
        self.indexes.insert(
            Arc::clone(&key),
            IndexGeneric::with_backend(self.prototype.clone()),
        );
        key
    }

    fn type_index(&mut self, tag: &Arc<str>) -> &mut TypeIndex<B> {
        let prototype = &self.prototype;
        self.indexes
            .entry(Arc::clone(tag))
            .or_insert_with(|| IndexGeneric::with_backend(prototype.clone()))
    }

    /// Apply every pending mark to the records and indexes.
    ///
    /// Dirty objects are processed first: their geometry is read through their handle and
    /// their record replaced. Removals follow, so an object both dirty and removed ends up
    /// removed. Only the indexes that changed are committed. Calling this again without new
    /// marks does nothing.
    pub fn update(&mut self) -> RefreshStats {
        if self.tracker.is_empty() {
            return RefreshStats::default();
        }
        let (dirty, removed) = self.tracker.take();
        let mut touched = TypeTags::new();

        for (id, handle) in dirty {
            let tag = self.intern(handle.type_tag());
            let aabb = rect_to_aabb(handle.aabb());
            let previous = self
                .positions
                .get(&id)
                .map(|p| (Arc::clone(p.type_tag_arc()), p.key));
            let key = match previous {
                Some((old_tag, key)) if old_tag == tag => {
                    self.type_index(&tag).update(key, aabb);
                    key
                }
                Some((old_tag, old_key)) => {
                    self.type_index(&old_tag).remove(old_key);
                    push_unique(&mut touched, old_tag);
                    self.type_index(&tag).insert(aabb, id)
                }
                None => self.type_index(&tag).insert(aabb, id),
            };
            let record = ObjectPosition::capture(&handle, Arc::clone(&tag), aabb, key);
            debug_assert_eq!(record.object_id(), id, "handle id changed while dirty");
            self.positions.insert(id, record);
            push_unique(&mut touched, tag);
        }

        for id in removed {
            let Some(record) = self.positions.remove(&id) else {
                continue;
            };
            let tag = Arc::clone(record.type_tag_arc());
            self.type_index(&tag).remove(record.key);
            push_unique(&mut touched, tag);
        }

        let mut stats = RefreshStats::default();
        for tag in &touched {
            stats.absorb(&self.type_index(tag).commit());
        }
        trace!(
            inserted = stats.inserted,
            moved = stats.moved,
            removed = stats.removed,
            types = touched.len(),
            "refreshed object positions"
        );
        stats
    }

    /// Distinct type tags of the records of `set`.
    fn types_of(&self, set: &ObjectIdSet) -> TypeTags {
        let mut tags = TypeTags::new();
        for id in set {
            if let Some(p) = self.positions.get(id) {
                push_unique(&mut tags, Arc::clone(p.type_tag_arc()));
            }
        }
        tags
    }

    /// Shared pick-and-trim protocol of the two-set queries.
    fn pick_pairs(
        &self,
        set1: &mut ObjectIdSet,
        set2: &mut ObjectIdSet,
        inverted: bool,
        search_area: impl Fn(&ObjectPosition) -> Aabb2D<f64>,
        is_match: impl Fn(&ObjectPosition, &ObjectPosition) -> bool,
    ) -> bool {
        let types = self.types_of(set2);
        let mut picked1 = ObjectIdSet::new();
        let mut picked2 = ObjectIdSet::new();
        let mut missing = 0_usize;

        for &id1 in set1.iter() {
            let Some(rec1) = self.positions.get(&id1) else {
                missing += 1;
                continue;
            };
            let area = search_area(rec1);
            let mut matched = false;
            'types: for tag in &types {
                let Some(index) = self.indexes.get(tag) else {
                    continue;
                };
                for (_, id2) in index.query_rect(area) {
                    if id2 == id1 || !set2.contains(&id2) {
                        continue;
                    }
                    let Some(rec2) = self.positions.get(&id2) else {
                        continue;
                    };
                    if !is_match(rec1, rec2) {
                        continue;
                    }
                    matched = true;
                    if inverted {
                        break 'types;
                    }
                    picked2.insert(id2);
                }
            }
            // Plain queries pick matches; inverted ones pick objects that matched nothing.
            if matched != inverted {
                picked1.insert(id1);
            }
        }

        if missing > 0 {
            debug!(missing, "skipped ids without a position record");
        }
        keep_only_ids(set1, &picked1);
        if !inverted {
            keep_only_ids(set2, &picked2);
        }
        !picked1.is_empty()
    }

    /// Pick the objects of `set1` whose hitboxes touch a hitbox of an object of `set2`.
    ///
    /// Candidates come from the indexes of the types present in `set2`, searched with each
    /// object's exact bounding box; an id is never tested against itself. Returns whether
    /// anything was picked.
    ///
    /// - Not inverted: `set1` and `set2` are both trimmed to the ids involved in a collision.
    /// - Inverted: `set1` is trimmed to the ids colliding with none of `set2`, and `set2` is
    ///   left untouched.
    ///
    /// Ids without a record (never created, or already removed) are dropped from `set1`
    /// and never match.
    pub fn collision_test(
        &mut self,
        set1: &mut ObjectIdSet,
        set2: &mut ObjectIdSet,
        inverted: bool,
        ignore_touching_edges: bool,
    ) -> bool {
        self.update();
        self.pick_pairs(set1, set2, inverted, ObjectPosition::aabb, |a, b| {
            a.hitboxes_collide(b, ignore_touching_edges)
        })
    }

    /// Pick the objects of `set1` within `distance` of an object of `set2`.
    ///
    /// Same picking and trimming rules as [`collision_test`](Self::collision_test). With
    /// [`DistanceMetric::AabbExpansion`] an object is near when its box overlaps the first
    /// object's box grown by `distance` on all sides; no polygon test is made.
    pub fn distance_test(
        &mut self,
        set1: &mut ObjectIdSet,
        set2: &mut ObjectIdSet,
        distance: f64,
        inverted: bool,
    ) -> bool {
        self.update();
        let metric = self.distance_metric;
        let limit = distance * distance;
        self.pick_pairs(
            set1,
            set2,
            inverted,
            |p| p.aabb().expand(distance),
            |a, b| match metric {
                DistanceMetric::AabbExpansion => true,
                DistanceMetric::Centers => a.center_distance_squared(b) < limit,
            },
        )
    }

    /// Pick the objects of `set` containing at least one of `points`.
    ///
    /// With `accurate`, a point must be inside one of the hitboxes; otherwise being inside
    /// the bounding box is enough.
    ///
    /// - Not inverted: `set` is trimmed to the picked ids; returns whether any was picked.
    /// - Inverted: picked ids are removed from `set`; returns whether any id remains.
    pub fn points_test(
        &mut self,
        set: &mut ObjectIdSet,
        points: &[Point],
        accurate: bool,
        inverted: bool,
    ) -> bool {
        self.update();
        let mut picked = ObjectIdSet::new();
        for tag in &self.types_of(set) {
            let Some(index) = self.indexes.get(tag) else {
                continue;
            };
            for &point in points {
                index.visit_point(point.x, point.y, |_, id| {
                    let inside = set.contains(&id)
                        && self
                            .positions
                            .get(&id)
                            .is_some_and(|p| p.contains_point(point, accurate));
                    if inside {
                        picked.insert(id);
                    }
                });
            }
        }
        if inverted {
            remove_ids(set, &picked);
            !set.is_empty()
        } else {
            keep_only_ids(set, &picked);
            !picked.is_empty()
        }
    }

    /// Push the objects of `set1` out of the objects of `set2`.
    ///
    /// For each object of `set1`, the separation vectors of all its colliding hitbox pairs
    /// are summed. All displacements are computed first and applied afterwards, so the
    /// result does not depend on iteration order. The records and indexes are moved; the
    /// returned deltas must be applied by the caller to its own objects, which the engine
    /// never mutates. Sets are not trimmed.
    pub fn separate_objects(
        &mut self,
        set1: &ObjectIdSet,
        set2: &ObjectIdSet,
        ignore_touching_edges: bool,
    ) -> Vec<Separation> {
        self.update();
        let types = self.types_of(set2);
        let mut moves = Vec::new();

        for &id1 in set1 {
            let Some(rec1) = self.positions.get(&id1) else {
                continue;
            };
            let mut total = Vec2::ZERO;
            let mut moved = false;
            for tag in &types {
                let Some(index) = self.indexes.get(tag) else {
                    continue;
                };
                for (_, id2) in index.query_rect(rec1.aabb()) {
                    if id2 == id1 || !set2.contains(&id2) {
                        continue;
                    }
                    let Some(rec2) = self.positions.get(&id2) else {
                        continue;
                    };
                    if let Some(delta) = rec1.separation_from(rec2, ignore_touching_edges) {
                        total += delta;
                        moved = true;
                    }
                }
            }
            if moved {
                moves.push(Separation {
                    object_id: id1,
                    delta: total,
                });
            }
        }

        let mut touched = TypeTags::new();
        for m in &moves {
            let Some(record) = self.positions.get_mut(&m.object_id) else {
                continue;
            };
            record.translate(m.delta);
            let tag = Arc::clone(record.type_tag_arc());
            let (key, aabb) = (record.key, record.aabb());
            self.type_index(&tag).update(key, aabb);
            push_unique(&mut touched, tag);
        }
        for tag in &touched {
            let _ = self.type_index(tag).commit();
        }
        moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{Shape, TestObject};
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;
    use kurbo::Rect;
    use proxima_index::backends::FlatVec;
    use proxima_polygon::ConvexPolygon;

    type Engine = SpatialQueryEngine<Rc<TestObject>>;

    fn ids(raw: &[u64]) -> ObjectIdSet {
        raw.iter().copied().map(ObjectId).collect()
    }

    fn square(id: u64, tag: &'static str, x: f64, y: f64) -> Rc<TestObject> {
        Rc::new(TestObject::square(id, tag, x, y, 10.0))
    }

    fn engine_with<B: Backend<f64> + Clone>(
        mut engine: SpatialQueryEngine<Rc<TestObject>, B>,
        objects: &[Rc<TestObject>],
    ) -> SpatialQueryEngine<Rc<TestObject>, B> {
        for o in objects {
            engine.mark_object_as_created(Rc::clone(o));
        }
        engine
    }

    fn engine(objects: &[Rc<TestObject>]) -> Engine {
        engine_with(Engine::new(), objects)
    }

    fn index_len(engine: &Engine, tag: &str) -> usize {
        engine.indexes.get(tag).map_or(0, |i| i.len())
    }

    #[test]
    fn overlapping_squares_collide() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 5.0, 5.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!((s1, s2), (ids(&[1]), ids(&[2])));
    }

    #[test]
    fn zero_distance_finds_overlapping_boxes() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 5.0, 5.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.distance_test(&mut s1, &mut s2, 0.0, false));
        assert_eq!((s1, s2), (ids(&[1]), ids(&[2])));
    }

    #[test]
    fn inverted_distance_keeps_lonely_objects() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 100.0, 100.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.distance_test(&mut s1, &mut s2, 5.0, true));
        assert_eq!((s1, s2), (ids(&[1]), ids(&[2])));
    }

    #[test]
    fn removed_ids_are_skipped() {
        let objects = [
            square(1, "A", 0.0, 0.0),
            square(2, "A", 5.0, 5.0),
            square(3, "A", 2.0, 2.0),
        ];
        let mut e = engine(&objects);
        e.update();
        e.mark_object_as_removed(&objects[2]);

        let (mut s1, mut s2) = (ids(&[3, 1]), ids(&[2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!(s1, ids(&[1]));

        let (mut s1, mut s2) = (ids(&[3]), ids(&[2]));
        assert!(!e.collision_test(&mut s1, &mut s2, true, false));
        assert!(s1.is_empty());
        assert!(e.position(ObjectId(3)).is_none());
    }

    fn two_team_layout() -> Vec<Rc<TestObject>> {
        vec![
            square(1, "A", 0.0, 0.0),
            square(2, "A", 30.0, 0.0),
            square(3, "A", 100.0, 0.0),
            square(4, "B", 5.0, 0.0),
            square(5, "B", 38.0, 0.0),
            square(6, "B", 200.0, 200.0),
            square(7, "B", 25.0, 5.0),
        ]
    }

    #[test]
    fn plain_collision_trims_both_sets_to_colliding_ids() {
        let mut e = engine(&two_team_layout());
        let (mut s1, mut s2) = (ids(&[1, 2, 3]), ids(&[4, 5, 6, 7]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!(s1, ids(&[1, 2]));
        assert_eq!(s2, ids(&[4, 5, 7]));
    }

    #[test]
    fn inverted_collision_never_trims_second_set() {
        let mut e = engine(&two_team_layout());
        let (mut s1, mut s2) = (ids(&[1, 2, 3]), ids(&[4, 5, 6, 7]));
        assert!(e.collision_test(&mut s1, &mut s2, true, false));
        assert_eq!(s1, ids(&[3]));
        assert_eq!(s2, ids(&[4, 5, 6, 7]));

        let (mut s1, mut s2) = (ids(&[1]), ids(&[4]));
        assert!(!e.collision_test(&mut s1, &mut s2, true, false));
        assert!(s1.is_empty());
        assert_eq!(s2, ids(&[4]));
    }

    #[test]
    fn an_object_never_collides_with_itself() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 5.0, 5.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[1]));
        assert!(!e.collision_test(&mut s1, &mut s2, false, false));
        assert!(s1.is_empty() && s2.is_empty());

        let (mut s1, mut s2) = (ids(&[1, 2]), ids(&[1, 2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!((s1, s2), (ids(&[1, 2]), ids(&[1, 2])));
    }

    #[test]
    fn empty_sets_yield_false() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0)]);
        let (mut s1, mut s2) = (ids(&[]), ids(&[1]));
        assert!(!e.collision_test(&mut s1, &mut s2, false, false));
        assert!(s1.is_empty() && s2.is_empty());
    }

    #[test]
    fn touching_edges_follow_flag() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 10.0, 0.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(!e.collision_test(&mut s1, &mut s2, false, true));
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
    }

    #[test]
    fn objects_without_hitboxes_never_collide() {
        let ghost = Rc::new(TestObject::new(
            1,
            "A",
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Shape::Ghost,
        ));
        let mut e = engine(&[ghost, square(2, "A", 5.0, 5.0)]);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(!e.collision_test(&mut s1, &mut s2, false, false));
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.distance_test(&mut s1, &mut s2, 0.0, false));
    }

    #[test]
    fn records_follow_latest_geometry() {
        let a = square(1, "A", 0.0, 0.0);
        let b = square(2, "A", 50.0, 0.0);
        let mut e = engine(&[a.clone(), b.clone()]);
        assert_eq!(
            e.update(),
            RefreshStats {
                inserted: 2,
                moved: 0,
                removed: 0
            }
        );

        a.move_to(45.0, 0.0);
        e.mark_object_as_dirty(a.clone());
        assert_eq!(e.update().moved, 1);
        let record = e.position(ObjectId(1)).unwrap();
        assert_eq!(record.aabb(), Aabb2D::new(45.0, 0.0, 55.0, 10.0));
        assert_eq!(record.position(), Point::new(45.0, 0.0));

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
    }

    #[test]
    fn refresh_is_idempotent() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "B", 5.0, 5.0)]);
        assert!(!e.update().is_empty());
        let counters = e.counters();
        let aabb = e.position(ObjectId(2)).map(ObjectPosition::aabb);

        assert!(e.update().is_empty());
        assert_eq!(e.counters(), counters);
        assert_eq!(e.position(ObjectId(2)).map(ObjectPosition::aabb), aabb);
        assert_eq!(index_len(&e, "A"), 1);
        assert_eq!(index_len(&e, "B"), 1);
    }

    #[test]
    fn removed_then_recreated_stays_indexed() {
        let a = square(1, "A", 0.0, 0.0);
        let mut e = engine(core::slice::from_ref(&a));
        e.update();

        e.mark_object_as_removed(&a);
        e.mark_object_as_created(a.clone());
        e.update();
        assert!(e.position(ObjectId(1)).is_some());
        assert_eq!(index_len(&e, "A"), 1);
    }

    #[test]
    fn removal_wins_over_dirty_in_same_refresh() {
        let a = square(1, "A", 0.0, 0.0);
        let mut e = engine(core::slice::from_ref(&a));
        e.mark_object_as_removed(&a);
        let stats = e.update();
        assert!(e.position(ObjectId(1)).is_none());
        assert_eq!(index_len(&e, "A"), 0);
        assert_eq!(stats, RefreshStats::default());
        assert_eq!(
            e.counters(),
            Counters {
                type_index_count: 1,
                object_position_count: 0
            }
        );
    }

    #[test]
    fn retyped_id_moves_between_indexes() {
        let a = square(1, "A", 0.0, 0.0);
        let mut e = engine(&[a.clone(), square(2, "A", 100.0, 0.0)]);
        e.update();

        a.retag("B");
        e.mark_object_as_dirty(a.clone());
        assert_eq!(
            e.update(),
            RefreshStats {
                inserted: 1,
                moved: 0,
                removed: 1
            }
        );
        assert_eq!(
            e.position(ObjectId(1)).map(ObjectPosition::type_tag),
            Some("B")
        );
        assert_eq!((index_len(&e, "A"), index_len(&e, "B")), (1, 1));

        e.mark_object_as_created(square(3, "C", 5.0, 5.0));
        let (mut s1, mut s2) = (ids(&[3]), ids(&[1]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!(e.counters().type_index_count, 3);
    }

    #[test]
    fn centre_metric_refines_box_distance() {
        let objects = [square(1, "A", 0.0, 0.0), square(2, "A", 12.0, 0.0)];
        let mut boxes = engine(&objects);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(boxes.distance_test(&mut s1, &mut s2, 5.0, false));

        let config = PositionsConfig::default().with_distance_metric(DistanceMetric::Centers);
        let mut centres = engine_with(Engine::with_config(config).unwrap(), &objects);
        assert_eq!(centres.distance_metric(), DistanceMetric::Centers);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(!centres.distance_test(&mut s1, &mut s2, 5.0, false));
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(centres.distance_test(&mut s1, &mut s2, 15.0, false));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PositionsConfig {
            max_children: 3,
            min_children: 3,
            ..PositionsConfig::default()
        };
        assert_eq!(
            Engine::with_config(config).err(),
            Some(ConfigError::MaxChildrenTooSmall {
                max_children: 3,
                min_children: 3
            })
        );
        let config = PositionsConfig {
            min_children: 0,
            ..PositionsConfig::default()
        };
        assert_eq!(
            Engine::with_config(config).err(),
            Some(ConfigError::MinChildrenZero)
        );
    }

    #[test]
    fn points_test_accuracy_and_inversion() {
        let tri = Rc::new(TestObject::new(
            1,
            "A",
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Shape::Triangle,
        ));
        let mut e = engine(&[tri, square(2, "A", 20.0, 0.0)]);

        let corner = [Point::new(8.0, 8.0)];
        let mut set = ids(&[1, 2]);
        assert!(e.points_test(&mut set, &corner, false, false));
        assert_eq!(set, ids(&[1]));

        let mut set = ids(&[1, 2]);
        assert!(!e.points_test(&mut set, &corner, true, false));
        assert!(set.is_empty());

        let both = [Point::new(2.0, 2.0), Point::new(25.0, 5.0)];
        let mut set = ids(&[1, 2]);
        assert!(e.points_test(&mut set, &both, true, false));
        assert_eq!(set, ids(&[1, 2]));

        let on_square = [Point::new(25.0, 5.0)];
        let mut set = ids(&[1, 2]);
        assert!(e.points_test(&mut set, &on_square, true, true));
        assert_eq!(set, ids(&[1]));

        let mut set = ids(&[1, 2]);
        assert!(!e.points_test(&mut set, &both, true, true));
        assert!(set.is_empty());
    }

    #[test]
    fn separation_moves_records_and_indexes() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "B", 7.0, 0.0)]);
        let moves = e.separate_objects(&ids(&[1]), &ids(&[2]), false);
        assert_eq!(
            moves,
            vec![Separation {
                object_id: ObjectId(1),
                delta: Vec2::new(-3.0, 0.0)
            }]
        );
        let record = e.position(ObjectId(1)).unwrap();
        assert_eq!(record.aabb(), Aabb2D::new(-3.0, 0.0, 7.0, 10.0));
        assert_eq!(record.center(), Point::new(2.0, 5.0));
        assert_eq!(
            record.hitboxes()[0].bounding_box(),
            Rect::new(-3.0, 0.0, 7.0, 10.0)
        );

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(!e.collision_test(&mut s1, &mut s2, false, true));
        let moved_into = [Point::new(-2.0, 5.0)];
        let mut set = ids(&[1]);
        assert!(e.points_test(&mut set, &moved_into, false, false));
    }

    #[test]
    fn separation_ignores_far_objects() {
        let mut e = engine(&[square(1, "A", 0.0, 0.0), square(2, "A", 50.0, 0.0)]);
        assert!(e.separate_objects(&ids(&[1]), &ids(&[2]), false).is_empty());
        assert!(e.separate_objects(&ids(&[1]), &ids(&[1]), false).is_empty());
    }

    #[test]
    fn borrowed_handles_work() {
        let a = TestObject::square(1, "A", 0.0, 0.0, 10.0);
        let b = TestObject::square(2, "A", 5.0, 5.0, 10.0);
        let mut e: SpatialQueryEngine<&TestObject> = SpatialQueryEngine::new();
        e.mark_object_as_created(&a);
        e.mark_object_as_created(&b);
        let (mut s1, mut s2) = (ids(&[1]), ids(&[2]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
    }

    #[test]
    fn backends_agree_with_brute_force() {
        let objects: Vec<Rc<TestObject>> = (0..60_u32)
            .map(|i| {
                let tag = if i < 30 { "A" } else { "B" };
                let (x, y) = (f64::from((i * 7) % 50), f64::from((i * 13) % 50));
                Rc::new(TestObject::square(u64::from(i), tag, x, y, 6.0))
            })
            .collect();
        let (team1, team2) = objects.split_at(30);

        let overlaps = |a: &TestObject, b: &TestObject| {
            let (ra, rb) = (a.aabb(), b.aabb());
            ra.x0 <= rb.x1 && rb.x0 <= ra.x1 && ra.y0 <= rb.y1 && rb.y0 <= ra.y1
        };
        let colliding = |mine: &[Rc<TestObject>], theirs: &[Rc<TestObject>]| -> ObjectIdSet {
            mine.iter()
                .filter(|a| theirs.iter().any(|b| overlaps(a, b)))
                .map(|a| a.id())
                .collect()
        };
        let expected1 = colliding(team1, team2);
        let expected2 = colliding(team2, team1);
        assert!(!expected1.is_empty());

        let ids_of =
            |team: &[Rc<TestObject>]| -> ObjectIdSet { team.iter().map(|o| o.id()).collect() };

        let mut rtree = engine(&objects);
        let (mut s1, mut s2) = (ids_of(team1), ids_of(team2));
        rtree.collision_test(&mut s1, &mut s2, false, false);
        assert_eq!((&s1, &s2), (&expected1, &expected2));

        let mut flat = engine_with(
            SpatialQueryEngine::with_backend(FlatVec::default()),
            &objects,
        );
        let (mut s1, mut s2) = (ids_of(team1), ids_of(team2));
        flat.collision_test(&mut s1, &mut s2, false, false);
        assert_eq!((&s1, &s2), (&expected1, &expected2));
    }

    #[test]
    fn distance_trims_second_set_to_near_candidates() {
        let mut e = engine(&spread_layout());
        let (mut s1, mut s2) = (ids(&[1, 6]), ids(&[2, 3, 4, 5]));
        assert!(e.distance_test(&mut s1, &mut s2, 3.0, false));
        assert_eq!(s1, ids(&[1]));
        assert_eq!(s2, ids(&[2, 3]));
    }

    #[test]
    fn inverted_distance_keeps_only_isolated_objects() {
        let mut e = engine(&spread_layout());
        let (mut s1, mut s2) = (ids(&[1, 4, 6]), ids(&[2, 3]));
        assert!(e.distance_test(&mut s1, &mut s2, 3.0, true));
        assert_eq!(s1, ids(&[4, 6]));
        assert_eq!(s2, ids(&[2, 3]));

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2, 3, 4]));
        assert!(!e.distance_test(&mut s1, &mut s2, 3.0, true));
        assert!(s1.is_empty());
        assert_eq!(s2, ids(&[2, 3, 4]));
    }

    /// One object with neighbours at gaps of 2, 3, 20 and 4, plus a far one.
    fn spread_layout() -> Vec<Rc<TestObject>> {
        vec![
            square(1, "A", 0.0, 0.0),
            square(2, "B", 12.0, 0.0),
            square(3, "B", 0.0, 13.0),
            square(4, "B", 30.0, 0.0),
            square(5, "C", 0.0, -14.0),
            square(6, "A", 100.0, 100.0),
        ]
    }

    #[test]
    fn second_set_ids_without_record_never_match() {
        let objects = [
            square(1, "A", 0.0, 0.0),
            square(2, "A", 5.0, 5.0),
            square(3, "B", 2.0, 2.0),
        ];
        let mut e = engine(&objects);
        e.update();
        e.mark_object_as_removed(&objects[1]);

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2, 3, 99]));
        assert!(e.collision_test(&mut s1, &mut s2, false, false));
        assert_eq!((s1, s2), (ids(&[1]), ids(&[3])));

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2, 99]));
        assert!(!e.distance_test(&mut s1, &mut s2, 50.0, false));
        assert!(s1.is_empty() && s2.is_empty());

        let (mut s1, mut s2) = (ids(&[1]), ids(&[2, 99]));
        assert!(e.collision_test(&mut s1, &mut s2, true, false));
        assert_eq!((s1, s2), (ids(&[1]), ids(&[2, 99])));
    }

    /// Provider whose box shifts every time it is read.
    struct Drifting {
        reads: Cell<u32>,
    }

    impl ObjectHandle for Drifting {
        fn id(&self) -> ObjectId {
            ObjectId(1)
        }

        fn type_tag(&self) -> &str {
            "A"
        }

        fn position(&self) -> Point {
            Point::ZERO
        }

        fn center(&self) -> Point {
            Point::new(5.0, 5.0)
        }

        fn hitboxes(&self) -> Vec<ConvexPolygon> {
            Vec::new()
        }

        fn aabb(&self) -> Rect {
            let n = self.reads.get();
            self.reads.set(n + 1);
            let x = 100.0 * f64::from(n);
            Rect::new(x, 0.0, x + 10.0, 10.0)
        }
    }

    #[test]
    fn record_box_is_the_indexed_box() {
        let object = Drifting {
            reads: Cell::new(0),
        };
        let mut e: SpatialQueryEngine<&Drifting> = SpatialQueryEngine::new();
        e.mark_object_as_created(&object);
        e.update();
        assert_eq!(object.reads.get(), 1);

        let record = e.position(ObjectId(1)).unwrap();
        let index = &e.indexes["A"];
        assert_eq!(index.get(record.key), Some((record.aabb(), ObjectId(1))));
        let hits: Vec<_> = index.query_rect(record.aabb()).map(|(_, id)| id).collect();
        assert_eq!(hits, [ObjectId(1)]);
    }

    // Small deterministic generator, as in the R-tree tests.
    struct XorShift(u64);

    impl XorShift {
        fn below(&mut self, n: usize) -> usize {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            let n = u64::try_from(n).unwrap();
            usize::try_from(self.0 % n).unwrap()
        }

        fn coord(&mut self) -> f64 {
            f64::from(u16::try_from(self.below(60)).unwrap())
        }
    }

    const TAGS: [&str; 3] = ["A", "B", "C"];

    /// Inclusive (or strict) overlap of `a` grown by `gap` with `b`.
    fn boxes_meet(a: Rect, b: Rect, gap: f64, strict: bool) -> bool {
        let (x0, y0, x1, y1) = (a.x0 - gap, a.y0 - gap, a.x1 + gap, a.y1 + gap);
        if strict {
            x0 < b.x1 && b.x0 < x1 && y0 < b.y1 && b.y0 < y1
        } else {
            x0 <= b.x1 && b.x0 <= x1 && y0 <= b.y1 && b.y0 <= y1
        }
    }

    /// Brute-force picking over the live objects: `(set1, set2, result)`.
    fn expected_picks(
        live: &[(ObjectId, Rect)],
        set1: &ObjectIdSet,
        set2: &ObjectIdSet,
        inverted: bool,
        is_match: impl Fn(Rect, Rect) -> bool,
    ) -> (ObjectIdSet, ObjectIdSet, bool) {
        let rect_of = |id: &ObjectId| live.iter().find(|(i, _)| i == id).map(|&(_, r)| r);
        let mut picked1 = ObjectIdSet::new();
        let mut picked2 = ObjectIdSet::new();
        for id1 in set1 {
            let Some(r1) = rect_of(id1) else {
                continue;
            };
            let mut matched = false;
            for id2 in set2 {
                if id2 == id1 {
                    continue;
                }
                if rect_of(id2).is_some_and(|r2| is_match(r1, r2)) {
                    matched = true;
                    picked2.insert(*id2);
                }
            }
            if matched != inverted {
                picked1.insert(*id1);
            }
        }
        let picked = !picked1.is_empty();
        let set2 = if inverted { set2.clone() } else { picked2 };
        (picked1, set2, picked)
    }

    #[test]
    fn churn_agrees_with_brute_force_model() {
        let config = PositionsConfig {
            max_children: 4,
            min_children: 2,
            ..PositionsConfig::default()
        };
        for seed in 1..=12_u64 {
            let mut rng = XorShift(0x9e37_79b9_7f4a_7c15 ^ seed);
            let pool: Vec<Rc<TestObject>> = (0..40).map(|i| square(i, "A", 0.0, 0.0)).collect();
            let mut alive = [false; 40];
            let mut e = Engine::with_config(config).unwrap();
            let (mut inserted, mut removed) = (0, 0);

            for step in 0..50 {
                for _ in 0..6 {
                    let i = rng.below(pool.len());
                    let obj = &pool[i];
                    match rng.below(5) {
                        0 | 1 if !alive[i] => {
                            obj.move_to(rng.coord(), rng.coord());
                            obj.retag(TAGS[rng.below(3)]);
                            e.mark_object_as_created(Rc::clone(obj));
                            alive[i] = true;
                        }
                        0 | 1 => {
                            obj.move_to(rng.coord(), rng.coord());
                            e.mark_object_as_dirty(Rc::clone(obj));
                        }
                        2 if alive[i] => {
                            obj.retag(TAGS[rng.below(3)]);
                            e.mark_object_as_dirty(Rc::clone(obj));
                        }
                        3 if alive[i] => {
                            if rng.below(2) == 0 {
                                obj.move_to(rng.coord(), rng.coord());
                                e.mark_object_as_dirty(Rc::clone(obj));
                            }
                            e.mark_object_as_removed(obj);
                            alive[i] = false;
                        }
                        4 if alive[i] => {
                            // Destroyed and recreated under the same id in one frame.
                            e.mark_object_as_removed(obj);
                            obj.move_to(rng.coord(), rng.coord());
                            e.mark_object_as_created(Rc::clone(obj));
                        }
                        _ => {}
                    }
                }
                let stats = e.update();
                inserted += stats.inserted;
                removed += stats.removed;

                let live: Vec<(ObjectId, Rect)> = pool
                    .iter()
                    .zip(&alive)
                    .filter(|&(_, &a)| a)
                    .map(|(o, _)| (o.id(), o.aabb()))
                    .collect();
                assert_eq!(e.counters().object_position_count, live.len());
                assert_eq!(inserted, removed + live.len(), "seed {seed}, step {step}");
                for tag in TAGS {
                    let tagged = pool
                        .iter()
                        .zip(&alive)
                        .filter(|&(o, &a)| a && o.type_tag() == tag)
                        .count();
                    assert_eq!(
                        index_len(&e, tag),
                        tagged,
                        "seed {seed}, step {step}, {tag}"
                    );
                }
                for &(id, rect) in &live {
                    let record = e.position(id).unwrap();
                    assert_eq!(record.aabb(), rect_to_aabb(rect));
                    let index = &e.indexes[record.type_tag()];
                    assert_eq!(index.get(record.key), Some((record.aabb(), id)));
                }

                let mut set1 = ObjectIdSet::new();
                let mut set2 = ObjectIdSet::new();
                for o in &pool {
                    if rng.below(3) == 0 {
                        set1.insert(o.id());
                    }
                    if rng.below(3) == 0 {
                        set2.insert(o.id());
                    }
                }
                for inverted in [false, true] {
                    for ignore_touching_edges in [false, true] {
                        let (mut s1, mut s2) = (set1.clone(), set2.clone());
                        let hit =
                            e.collision_test(&mut s1, &mut s2, inverted, ignore_touching_edges);
                        let expected = expected_picks(&live, &set1, &set2, inverted, |a, b| {
                            boxes_meet(a, b, 0.0, ignore_touching_edges)
                        });
                        assert_eq!((s1, s2, hit), expected, "seed {seed}, step {step}");
                    }
                    let (mut s1, mut s2) = (set1.clone(), set2.clone());
                    let hit = e.distance_test(&mut s1, &mut s2, 3.0, inverted);
                    let expected = expected_picks(&live, &set1, &set2, inverted, |a, b| {
                        boxes_meet(a, b, 3.0, false)
                    });
                    assert_eq!((s1, s2, hit), expected, "seed {seed}, step {step}");
                }
            }
        }
    }
}
