// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers between id sets and the object lists callers hold.
//!
//! Queries work on [`ObjectIdSet`]s; callers usually hold lists of objects. These helpers
//! convert lists into sets and trim lists back to the ids a query picked.

use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::handle::{ObjectHandle, ObjectId};

/// Set of object ids passed to, and trimmed by, the engine's queries.
pub type ObjectIdSet = HashSet<ObjectId>;

/// Remove from `set` every id that is not in `keep`.
pub fn keep_only_ids(set: &mut ObjectIdSet, keep: &ObjectIdSet) {
    set.retain(|id| keep.contains(id));
}

/// Remove from `set` every id that is in `remove`.
pub fn remove_ids(set: &mut ObjectIdSet, remove: &ObjectIdSet) {
    set.retain(|id| !remove.contains(id));
}

/// Collect the ids of every object of every list.
///
/// ```rust
/// # use kurbo::{Point, Rect};
/// # use proxima_polygon::ConvexPolygon;
/// use proxima_positions::{ObjectHandle, ObjectId, object_ids_from_lists};
///
/// # struct Obj(u64);
/// # impl ObjectHandle for Obj {
/// #     fn id(&self) -> ObjectId { ObjectId(self.0) }
/// #     fn type_tag(&self) -> &str { "Obj" }
/// #     fn position(&self) -> Point { Point::ORIGIN }
/// #     fn center(&self) -> Point { Point::ORIGIN }
/// #     fn hitboxes(&self) -> Vec<ConvexPolygon> { Vec::new() }
/// #     fn aabb(&self) -> Rect { Rect::ZERO }
/// # }
/// let players = vec![Obj(1), Obj(2)];
/// let enemies = vec![Obj(3)];
/// let ids = object_ids_from_lists([players.as_slice(), enemies.as_slice()]);
/// assert_eq!(ids.len(), 3);
/// assert!(ids.contains(&ObjectId(3)));
/// ```
pub fn object_ids_from_lists<'a, H>(lists: impl IntoIterator<Item = &'a [H]>) -> ObjectIdSet
where
    H: ObjectHandle + 'a,
{
    let mut ids = ObjectIdSet::new();
    for list in lists {
        ids.extend(list.iter().map(|obj| obj.id()));
    }
    ids
}

/// Trim every list to the objects whose id is in `ids`, keeping their order.
pub fn keep_only_objects_from_ids<'a, H>(
    lists: impl IntoIterator<Item = &'a mut Vec<H>>,
    ids: &ObjectIdSet,
) where
    H: ObjectHandle + 'a,
{
    for list in lists {
        list.retain(|obj| ids.contains(&obj.id()));
    }
}

/// Trim every list to the objects whose id is in at least one of `groups`.
pub fn keep_only_objects_from_grouped_ids<'a, H>(
    lists: impl IntoIterator<Item = &'a mut Vec<H>>,
    groups: &[ObjectIdSet],
) where
    H: ObjectHandle + 'a,
{
    for list in lists {
        list.retain(|obj| {
            let id = obj.id();
            groups.iter().any(|group| group.contains(&id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestObject;
    use alloc::vec;

    fn ids(raw: &[u64]) -> ObjectIdSet {
        raw.iter().copied().map(ObjectId).collect()
    }

    fn objects(raw: &[u64]) -> Vec<TestObject> {
        raw.iter()
            .map(|&id| TestObject::square(id, "A", 0.0, 0.0, 1.0))
            .collect()
    }

    fn id_list(list: &[TestObject]) -> Vec<u64> {
        list.iter().map(|o| o.id().0).collect()
    }

    #[test]
    fn keep_and_remove() {
        let mut set = ids(&[1, 2, 3, 4]);
        keep_only_ids(&mut set, &ids(&[2, 4, 9]));
        assert_eq!(set, ids(&[2, 4]));
        remove_ids(&mut set, &ids(&[4]));
        assert_eq!(set, ids(&[2]));
    }

    #[test]
    fn lists_to_set_and_back() {
        let mut a = objects(&[1, 2, 3]);
        let mut b = objects(&[4, 5]);
        assert_eq!(
            object_ids_from_lists([a.as_slice(), b.as_slice()]),
            ids(&[1, 2, 3, 4, 5])
        );

        keep_only_objects_from_ids([&mut a, &mut b], &ids(&[3, 1, 5]));
        assert_eq!(id_list(&a), vec![1, 3]);
        assert_eq!(id_list(&b), vec![5]);
    }

    #[test]
    fn grouped_ids_keep_union() {
        let mut a = objects(&[1, 2, 3, 4]);
        keep_only_objects_from_grouped_ids([&mut a], &[ids(&[1]), ids(&[4, 7])]);
        assert_eq!(id_list(&a), vec![1, 4]);

        keep_only_objects_from_grouped_ids([&mut a], &[]);
        assert!(a.is_empty());
    }
}
