//! # Sparse Set
//!
//! Maps entity indices to positions in a dense packed array.
//!
//! ```text
//! sparse (paged):  [ - | 2 | - | 0 | - | 1 ]   indexed by entity index
//! packed:          [ e3, e5, e1 ]              dense, unordered
//! ```
//!
//! Erase swaps the last packed element into the hole, so positions of
//! other entities may change. No order is guaranteed unless the set was
//! explicitly sorted.

use std::cmp::Ordering;
use std::iter::{Copied, Rev};
use std::slice;

use super::algorithm::{radix_sort, SortAlgorithm};
use super::entity::Entity;
use crate::config::DEFAULT_SPARSE_PAGE_SIZE;
use crate::memory::PagedIndex;

/// Iterator over a set's entities, from the last packed position to the first.
pub type SetIter<'a> = Copied<Rev<slice::Iter<'a, Entity>>>;

/// Sparse set of entities.
#[derive(Clone, Debug)]
pub struct SparseSet {
    /// Entity index to packed position.
    sparse: PagedIndex,
    /// Dense array of contained entities.
    packed: Vec<Entity>,
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSet {
    /// Creates an empty set with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_SPARSE_PAGE_SIZE)
    }

    /// Creates an empty set whose sparse pages hold `page_size` slots.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            sparse: PagedIndex::new(page_size),
            packed: Vec::new(),
        }
    }

    /// Returns the number of contained entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.packed.len()
    }

    /// Checks if the set is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }

    /// Returns the packed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.packed.capacity()
    }

    /// Returns the number of entity indices the sparse pages can address.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> usize {
        self.sparse.extent()
    }

    /// Reserves packed space for `additional` more entities.
    pub fn reserve(&mut self, additional: usize) {
        self.packed.reserve(additional);
    }

    /// Checks if the set contains `entity`.
    ///
    /// Stale handles (same index, other version) are not contained.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.try_index(entity).is_some()
    }

    /// Returns the packed position of `entity`, if contained.
    #[inline]
    #[must_use]
    pub fn try_index(&self, entity: Entity) -> Option<usize> {
        self.sparse
            .get(entity.slot())
            .filter(|&pos| self.packed.get(pos) == Some(&entity))
    }

    /// Returns the packed position of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the set does not contain `entity`.
    #[inline]
    #[must_use]
    pub fn index(&self, entity: Entity) -> usize {
        let Some(pos) = self.try_index(entity) else {
            panic!("{entity:?} is not in the set");
        };
        pos
    }

    /// Returns the entity at packed position `pos`.
    #[inline]
    #[must_use]
    pub fn at(&self, pos: usize) -> Option<Entity> {
        self.packed.get(pos).copied()
    }

    /// Returns the packed entities in position order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.packed
    }

    /// Iterates from the last packed position to the first.
    #[inline]
    pub fn iter(&self) -> SetIter<'_> {
        self.packed.iter().rev().copied()
    }

    /// Appends `entity` to the set.
    ///
    /// Must not already be contained (checked in debug builds).
    #[inline]
    pub fn emplace(&mut self, entity: Entity) {
        debug_assert!(!entity.is_null(), "cannot store the null entity");
        debug_assert!(!self.contains(entity), "{entity:?} is already in the set");

        self.sparse.insert(entity.slot(), self.packed.len());
        self.packed.push(entity);
    }

    /// Appends every entity of `entities`, with the same precondition as
    /// [`SparseSet::emplace`].
    pub fn insert<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        let entities = entities.into_iter();
        self.packed.reserve(entities.size_hint().0);
        for entity in entities {
            self.emplace(entity);
        }
    }

    /// Removes `entity` by swapping the last element into its position.
    ///
    /// # Returns
    ///
    /// The packed position that was vacated. Parallel arrays must apply the
    /// same swap-remove at this position.
    ///
    /// # Panics
    ///
    /// Panics if the set does not contain `entity`.
    #[inline]
    pub fn erase(&mut self, entity: Entity) -> usize {
        let pos = self.index(entity);
        self.packed.swap_remove(pos);
        if let Some(&moved) = self.packed.get(pos) {
            self.sparse.insert(moved.slot(), pos);
        }
        self.sparse.remove(entity.slot());
        pos
    }

    /// Removes `entity` if contained.
    ///
    /// # Returns
    ///
    /// `true` if the entity was removed.
    pub fn remove(&mut self, entity: Entity) -> bool {
        if self.contains(entity) {
            self.erase(entity);
            true
        } else {
            false
        }
    }

    /// Exchanges the packed positions of two contained entities.
    ///
    /// # Panics
    ///
    /// Panics if either entity is not contained.
    pub fn swap(&mut self, lhs: Entity, rhs: Entity) {
        let (lhs, rhs) = (self.index(lhs), self.index(rhs));
        self.swap_positions(lhs, rhs);
    }

    /// Exchanges two packed positions and fixes their sparse slots.
    #[inline]
    pub(crate) fn swap_positions(&mut self, lhs: usize, rhs: usize) {
        if lhs == rhs {
            return;
        }
        self.packed.swap(lhs, rhs);
        self.sparse.insert(self.packed[lhs].slot(), lhs);
        self.sparse.insert(self.packed[rhs].slot(), rhs);
    }

    /// Removes every entity. Sparse pages are released.
    pub fn clear(&mut self) {
        self.sparse.clear();
        self.packed.clear();
    }

    /// Sorts the whole set so that iteration follows `compare`.
    pub fn sort_by<F>(&mut self, compare: F, algo: SortAlgorithm)
    where
        F: FnMut(Entity, Entity) -> Ordering,
    {
        self.sort_n_by(self.len(), compare, algo);
    }

    /// Sorts the first `count` packed positions so that iteration over them
    /// follows `compare`. Positions past `count` are untouched.
    pub fn sort_n_by<F>(&mut self, count: usize, mut compare: F, algo: SortAlgorithm)
    where
        F: FnMut(Entity, Entity) -> Ordering,
    {
        debug_assert!(count <= self.len(), "sort range out of bounds");

        let packed = &self.packed;
        let mut order: Vec<usize> = (0..count).collect();
        algo.sort(&mut order, |&lhs, &rhs| compare(packed[rhs], packed[lhs]));
        self.arrange(order, |_, _| {});
    }

    /// Sorts the set in linear time so that iteration visits ascending keys.
    pub fn sort_by_radix<K>(&mut self, mut key: K)
    where
        K: FnMut(Entity) -> u32,
    {
        let order = radix_order(self.len(), |pos| key(self.packed[pos]));
        self.arrange(order, |_, _| {});
    }

    /// Makes the entities shared with `other` follow `other`'s order.
    ///
    /// Shared entities are moved to the highest positions, so iteration
    /// visits them first and in the same relative order as iterating
    /// `other`. The remaining entities end up in unspecified order.
    pub fn respect(&mut self, other: &SparseSet) {
        self.respect_with(other, |_, _| {});
    }

    /// [`SparseSet::respect`], reporting every positional swap to `on_swap`.
    pub(crate) fn respect_with<S>(&mut self, other: &SparseSet, mut on_swap: S)
    where
        S: FnMut(usize, usize),
    {
        let mut pos = self.packed.len();
        for &entity in other.packed.iter().rev() {
            if pos == 0 {
                break;
            }
            if let Some(current) = self.try_index(entity) {
                pos -= 1;
                if current != pos {
                    self.swap_positions(current, pos);
                    on_swap(current, pos);
                }
            }
        }
    }

    /// Permutes the first `order.len()` positions so that position `i`
    /// receives the element currently at `order[i]`.
    ///
    /// Every swap applied to the packed array is reported to `on_swap` so a
    /// parallel array can follow it.
    pub(crate) fn arrange<S>(&mut self, mut order: Vec<usize>, mut on_swap: S)
    where
        S: FnMut(usize, usize),
    {
        let count = order.len();
        debug_assert!(count <= self.len(), "arrangement out of bounds");

        for start in 0..count {
            if order[start] == start {
                continue;
            }
            let mut curr = start;
            loop {
                let next = order[curr];
                order[curr] = curr;
                if next == start {
                    break;
                }
                self.packed.swap(curr, next);
                on_swap(curr, next);
                curr = next;
            }
        }

        for (pos, entity) in self.packed[..count].iter().enumerate() {
            self.sparse.insert(entity.slot(), pos);
        }
    }
}

/// Positions `0..len` ordered so that iteration (last to first) visits
/// ascending keys.
pub(crate) fn radix_order<K>(len: usize, mut key: K) -> Vec<usize>
where
    K: FnMut(usize) -> u32,
{
    let mut order: Vec<usize> = (0..len).collect();
    radix_sort(&mut order, |&pos| key(pos));
    order.reverse();
    order
}

impl<'a> IntoIterator for &'a SparseSet {
    type Item = Entity;
    type IntoIter = SetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
