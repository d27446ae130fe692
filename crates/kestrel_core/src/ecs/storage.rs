//! # Component Storage
//!
//! A sparse set with one payload per entity, kept in lockstep:
//!
//! ```text
//! packed:     [ e3, e5, e1 ]
//! instances:  [ c3, c5, c1 ]
//! ```
//!
//! Every swap or swap-remove on the set is mirrored on `instances`.
//! Zero-sized components never allocate instance memory.

use std::any::Any;
use std::cmp::Ordering;
use std::iter::{Copied, Rev, Zip};
use std::slice;

use super::algorithm::SortAlgorithm;
use super::component::Component;
use super::entity::Entity;
use super::sparse_set::{radix_order, SparseSet};

/// Iterator over `(entity, &component)` pairs, last packed position first.
pub type StorageIter<'a, T> = Rev<Zip<Copied<slice::Iter<'a, Entity>>, slice::Iter<'a, T>>>;

/// Iterator over `(entity, &mut component)` pairs, last packed position first.
pub type StorageIterMut<'a, T> = Rev<Zip<Copied<slice::Iter<'a, Entity>>, slice::IterMut<'a, T>>>;

/// Dense storage for a single component type.
///
/// # Type Parameters
///
/// * `T` - The component type to store
#[derive(Clone, Debug)]
pub struct Storage<T> {
    /// Entity membership and positions.
    set: SparseSet,
    /// Payloads, `instances[p]` belongs to `set.entities()[p]`.
    instances: Vec<T>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Storage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            set: SparseSet::new(),
            instances: Vec::new(),
        }
    }

    /// Creates an empty storage with a custom sparse page size.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            set: SparseSet::with_page_size(page_size),
            instances: Vec::new(),
        }
    }

    /// Returns the underlying entity set.
    #[inline]
    #[must_use]
    pub fn set(&self) -> &SparseSet {
        &self.set
    }

    /// Returns the number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Checks if the storage is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Returns the packed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.set.capacity()
    }

    /// Reserves room for `additional` more components.
    pub fn reserve(&mut self, additional: usize) {
        self.set.reserve(additional);
        self.instances.reserve(additional);
    }

    /// Checks if `entity` has a component here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.set.contains(entity)
    }

    /// Returns the packed entities in position order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.set.entities()
    }

    /// Returns the components in position order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[T] {
        &self.instances
    }

    /// Returns the components in position order, mutably.
    #[inline]
    pub fn components_mut(&mut self) -> &mut [T] {
        &mut self.instances
    }

    /// Attaches `value` to `entity`.
    ///
    /// The value is fully built before anything is inserted, so a panicking
    /// constructor at the call site leaves the storage untouched.
    ///
    /// # Returns
    ///
    /// The freshly stored component.
    #[inline]
    pub fn emplace(&mut self, entity: Entity, value: T) -> &mut T {
        self.set.emplace(entity);
        self.instances.push(value);
        let last = self.instances.len() - 1;
        &mut self.instances[last]
    }

    /// Attaches every `(entity, value)` pair.
    pub fn insert<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (Entity, T)>,
    {
        let pairs = pairs.into_iter();
        self.reserve(pairs.size_hint().0);
        for (entity, value) in pairs {
            self.emplace(entity, value);
        }
    }

    /// Detaches and returns the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no component here.
    #[inline]
    pub fn remove(&mut self, entity: Entity) -> T {
        let pos = self.set.erase(entity);
        self.instances.swap_remove(pos)
    }

    /// Detaches and drops the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no component here.
    #[inline]
    pub fn erase(&mut self, entity: Entity) {
        drop(self.remove(entity));
    }

    /// Returns the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no component here.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> &T {
        &self.instances[self.set.index(entity)]
    }

    /// Returns the component of `entity` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no component here.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> &mut T {
        let pos = self.set.index(entity);
        &mut self.instances[pos]
    }

    /// Returns the component of `entity`, if any.
    #[inline]
    #[must_use]
    pub fn try_get(&self, entity: Entity) -> Option<&T> {
        self.set.try_index(entity).map(|pos| &self.instances[pos])
    }

    /// Returns the component of `entity` mutably, if any.
    #[inline]
    pub fn try_get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let pos = self.set.try_index(entity)?;
        Some(&mut self.instances[pos])
    }

    /// Returns the component at packed position `pos`.
    #[inline]
    #[must_use]
    pub fn get_at(&self, pos: usize) -> Option<&T> {
        self.instances.get(pos)
    }

    /// Returns the component at packed position `pos`, mutably.
    #[inline]
    pub fn get_at_mut(&mut self, pos: usize) -> Option<&mut T> {
        self.instances.get_mut(pos)
    }

    /// Iterates `(entity, &component)` from the last packed position.
    pub fn iter(&self) -> StorageIter<'_, T> {
        self.set
            .entities()
            .iter()
            .copied()
            .zip(self.instances.iter())
            .rev()
    }

    /// Iterates `(entity, &mut component)` from the last packed position.
    pub fn iter_mut(&mut self) -> StorageIterMut<'_, T> {
        self.set
            .entities()
            .iter()
            .copied()
            .zip(self.instances.iter_mut())
            .rev()
    }

    /// Splits into the entity set and the component slice.
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (&SparseSet, &mut [T]) {
        (&self.set, &mut self.instances)
    }

    /// Exchanges the positions of two contained entities.
    ///
    /// # Panics
    ///
    /// Panics if either entity is not contained.
    pub fn swap(&mut self, lhs: Entity, rhs: Entity) {
        let (lhs, rhs) = (self.set.index(lhs), self.set.index(rhs));
        self.swap_positions(lhs, rhs);
    }

    #[inline]
    pub(crate) fn swap_positions(&mut self, lhs: usize, rhs: usize) {
        self.set.swap_positions(lhs, rhs);
        self.instances.swap(lhs, rhs);
    }

    /// Sorts so that iteration follows `compare` on the components.
    pub fn sort_by<F>(&mut self, compare: F, algo: SortAlgorithm)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.sort_n_by(self.len(), compare, algo);
    }

    /// Sorts the first `count` packed positions by component.
    pub fn sort_n_by<F>(&mut self, count: usize, mut compare: F, algo: SortAlgorithm)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let instances = &self.instances;
        let mut order: Vec<usize> = (0..count).collect();
        algo.sort(&mut order, |&lhs, &rhs| compare(&instances[rhs], &instances[lhs]));

        let instances = &mut self.instances;
        self.set.arrange(order, |lhs, rhs| instances.swap(lhs, rhs));
    }

    /// Sorts so that iteration follows `compare` on the entities.
    pub fn sort_by_entity<F>(&mut self, mut compare: F, algo: SortAlgorithm)
    where
        F: FnMut(Entity, Entity) -> Ordering,
    {
        let packed = self.set.entities();
        let mut order: Vec<usize> = (0..packed.len()).collect();
        algo.sort(&mut order, |&lhs, &rhs| compare(packed[rhs], packed[lhs]));

        let instances = &mut self.instances;
        self.set.arrange(order, |lhs, rhs| instances.swap(lhs, rhs));
    }

    /// Sorts in linear time so that iteration visits ascending keys.
    pub fn sort_by_radix<K>(&mut self, mut key: K)
    where
        K: FnMut(&T) -> u32,
    {
        let instances = &self.instances;
        let order = radix_order(instances.len(), |pos| key(&instances[pos]));

        let instances = &mut self.instances;
        self.set.arrange(order, |lhs, rhs| instances.swap(lhs, rhs));
    }

    /// Makes the entities shared with `other` follow `other`'s order.
    ///
    /// See [`SparseSet::respect`].
    pub fn respect(&mut self, other: &SparseSet) {
        let instances = &mut self.instances;
        self.set.respect_with(other, |lhs, rhs| instances.swap(lhs, rhs));
    }

    /// Removes every component.
    pub fn clear(&mut self) {
        self.set.clear();
        self.instances.clear();
    }
}

impl<'a, T> IntoIterator for &'a Storage<T> {
    type Item = (Entity, &'a T);
    type IntoIter = StorageIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Operations the registry needs on a pool without knowing its type.
pub(crate) trait ErasedStorage: Any + Send + Sync {
    fn set(&self) -> &SparseSet;
    fn erase(&mut self, entity: Entity);
    fn swap_positions(&mut self, lhs: usize, rhs: usize);
    fn respect(&mut self, other: &SparseSet);
    fn reserve(&mut self, additional: usize);
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for Storage<T> {
    fn set(&self) -> &SparseSet {
        &self.set
    }

    fn erase(&mut self, entity: Entity) {
        Storage::erase(self, entity);
    }

    fn swap_positions(&mut self, lhs: usize, rhs: usize) {
        Storage::swap_positions(self, lhs, rhs);
    }

    fn respect(&mut self, other: &SparseSet) {
        Storage::respect(self, other);
    }

    fn reserve(&mut self, additional: usize) {
        Storage::reserve(self, additional);
    }

    fn clear(&mut self) {
        Storage::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_lockstep_after_erase() {
        let mut storage = Storage::new();
        storage.emplace(e(1), 10);
        storage.emplace(e(2), 20);
        storage.emplace(e(3), 30);

        assert_eq!(storage.remove(e(1)), 10);
        assert_eq!(*storage.get(e(2)), 20);
        assert_eq!(*storage.get(e(3)), 30);
        for (pos, &entity) in storage.entities().iter().enumerate() {
            assert_eq!(storage.get_at(pos), Some(storage.get(entity)));
        }
    }

    #[test]
    fn test_reemplace_never_stale() {
        let mut storage = Storage::new();
        storage.emplace(e(4), String::from("old"));
        storage.erase(e(4));
        assert!(storage.try_get(e(4)).is_none());

        storage.emplace(e(4), String::from("new"));
        assert_eq!(storage.get(e(4)), "new");
    }

    #[test]
    fn test_zero_sized_component() {
        #[derive(Debug, PartialEq)]
        struct Tag;

        let mut storage = Storage::new();
        for i in 0..100 {
            storage.emplace(e(i), Tag);
        }
        assert_eq!(storage.len(), 100);
        assert!(storage.contains(e(50)));
        assert_eq!(storage.remove(e(50)), Tag);
        assert!(!storage.contains(e(50)));
    }

    #[test]
    fn test_iter_pairs() {
        let mut storage = Storage::new();
        storage.insert([(e(1), 'a'), (e(2), 'b')]);
        let pairs: Vec<(Entity, char)> = storage.iter().map(|(en, c)| (en, *c)).collect();
        assert_eq!(pairs, vec![(e(2), 'b'), (e(1), 'a')]);

        for (_, c) in storage.iter_mut() {
            *c = c.to_ascii_uppercase();
        }
        assert_eq!(*storage.get(e(1)), 'A');
    }

    #[test]
    fn test_sort_by_component_moves_payloads() {
        let mut storage = Storage::new();
        storage.insert([(e(0), 5), (e(1), 3), (e(2), 9), (e(3), 1)]);
        storage.sort_by(Ord::cmp, SortAlgorithm::Standard);

        let values: Vec<i32> = storage.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 3, 5, 9]);
        assert_eq!(*storage.get(e(2)), 9);
        assert_eq!(*storage.get(e(3)), 1);
    }

    #[test]
    fn test_sort_by_entity_and_radix() {
        let mut storage = Storage::new();
        storage.insert([(e(7), 70u32), (e(2), 20), (e(5), 50)]);

        storage.sort_by_entity(|l, r| l.index().cmp(&r.index()), SortAlgorithm::Insertion);
        let order: Vec<Entity> = storage.iter().map(|(en, _)| en).collect();
        assert_eq!(order, vec![e(2), e(5), e(7)]);

        storage.sort_by_radix(|v| u32::MAX - *v);
        let values: Vec<u32> = storage.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![70, 50, 20]);
        assert_eq!(*storage.get(e(5)), 50);
    }

    #[test]
    fn test_respect_moves_payloads() {
        let mut master = SparseSet::new();
        master.insert([e(3), e(1), e(2)]);

        let mut storage = Storage::new();
        storage.insert([(e(1), 'x'), (e(2), 'y'), (e(3), 'z')]);
        storage.respect(&master);

        let pairs: Vec<(Entity, char)> = storage.iter().map(|(en, c)| (en, *c)).collect();
        assert_eq!(pairs, vec![(e(2), 'y'), (e(1), 'x'), (e(3), 'z')]);
    }
}
