//! # Registry
//!
//! Owns entities, component pools, groups and context variables.
//!
//! ## Entity Slots
//!
//! ```text
//! entities:  [ 0v0 | 3v1 | 2v0 | null v1 ]     destroyed = 1
//!                     └─┐         ▲
//!                       └─────────┘
//! ```
//!
//! A live slot stores its own entity. A free slot stores the index of the
//! next free slot together with the version it will be recycled with, so
//! the free list is threaded through the same array. A slot is alive iff
//! its index field equals its position.

use std::any::{type_name, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use super::algorithm::SortAlgorithm;
use super::component::{Component, ComponentId, ComponentInfo, ComponentSet};
use super::context::Context;
use super::entity::Entity;
use super::group::{self, Group, GroupData};
use super::pool::{disjoint_mut, Event, Pool};
use super::runtime_view::RuntimeView;
use super::signal::Sink;
use super::snapshot::EntitySnapshot;
use super::sparse_set::SparseSet;
use super::storage::Storage;
use super::view::{View, ViewMut};
use crate::config::RegistryConfig;
use crate::error::{EcsError, EcsResult};

/// The entity-component registry.
///
/// # Example
///
/// ```rust
/// use kestrel_core::Registry;
///
/// struct Position(f32, f32);
/// struct Velocity(f32, f32);
///
/// let mut registry = Registry::new();
/// let entity = registry.create();
/// registry.emplace(entity, Position(0.0, 0.0));
/// registry.emplace(entity, Velocity(1.0, 2.0));
///
/// registry.view_mut::<(Position, Velocity)>().each(|_, (pos, vel)| {
///     pos.0 += vel.0;
///     pos.1 += vel.1;
/// });
/// assert_eq!(registry.get::<Position>(entity).1, 2.0);
/// ```
pub struct Registry {
    /// Live entities and the threaded free list.
    pub(crate) entities: Vec<Entity>,
    /// Head of the free list, null if empty.
    pub(crate) destroyed: Entity,
    /// One pool per component type, in first-use order.
    pub(crate) pools: Vec<Pool>,
    /// Component type to pool position.
    index: HashMap<TypeId, usize>,
    /// Group handlers, for the registry's whole lifetime.
    pub(crate) groups: Vec<GroupData>,
    context: Context,
    config: RegistryConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("size", &self.size())
            .field("alive", &self.alive())
            .field("pools", &self.pools.len())
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            destroyed: Entity::NULL,
            pools: Vec::new(),
            index: HashMap::new(),
            groups: Vec::new(),
            context: Context::default(),
            config: RegistryConfig::default(),
        }
    }

    /// Creates an empty registry using `config` for its memory layout.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration is invalid.
    pub fn with_config(config: RegistryConfig) -> EcsResult<Self> {
        config.validate()?;

        let mut registry = Self::new();
        registry.entities.reserve(config.entity_capacity);
        registry.config = config;
        Ok(registry)
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Returns the number of slots ever created, alive or free.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of alive entities.
    ///
    /// Walks the free list, so this is O(free slots).
    #[must_use]
    pub fn alive(&self) -> usize {
        let mut alive = self.entities.len();
        let mut curr = self.destroyed;
        while !curr.is_null() {
            alive -= 1;
            curr = self.entities[curr.slot()];
        }
        alive
    }

    /// Checks if there are no alive entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive() == 0
    }

    /// Returns the slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Reserves room for `additional` more entity slots.
    pub fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
    }

    /// Reserves room for `additional` more components of type `T`.
    pub fn reserve_pool<T: Component>(&mut self, additional: usize) {
        let pool = self.assure::<T>();
        self.pools[pool].storage.reserve(additional);
    }

    /// Checks if `entity` is alive in this registry.
    #[inline]
    #[must_use]
    pub fn valid(&self, entity: Entity) -> bool {
        self.entities.get(entity.slot()) == Some(&entity)
    }

    /// Returns the version currently stored in `entity`'s slot.
    ///
    /// For a free slot this is the version the slot will be recycled with.
    ///
    /// # Panics
    ///
    /// Panics if the slot was never created.
    #[must_use]
    pub fn current(&self, entity: Entity) -> u32 {
        assert!(entity.slot() < self.entities.len(), "{entity:?} was never created");
        self.entities[entity.slot()].version()
    }

    /// Creates an entity, recycling a free slot if there is one.
    ///
    /// # Panics
    ///
    /// Panics if the entity index space is exhausted.
    pub fn create(&mut self) -> Entity {
        if self.destroyed.is_null() {
            let index = self.entities.len();
            assert!(index < Entity::INDEX_MASK as usize, "entity index space exhausted");
            let entity = Entity::new(index as u32, 0);
            self.entities.push(entity);
            entity
        } else {
            let slot = self.destroyed.slot();
            let stored = self.entities[slot];
            self.destroyed = Entity::new(stored.index(), 0);
            let entity = Entity::new(slot as u32, stored.version());
            self.entities[slot] = entity;
            entity
        }
    }

    /// Creates the entity `hint` if possible.
    ///
    /// - A slot past the end is created after threading the gap onto the
    ///   free list.
    /// - A free slot is spliced out of the free list and takes the hint's
    ///   version.
    /// - An alive slot falls back to [`Registry::create`].
    ///
    /// # Panics
    ///
    /// Panics if `hint` is null.
    pub fn create_with_hint(&mut self, hint: Entity) -> Entity {
        assert!(!hint.is_null(), "cannot create the null entity");

        let requested = hint.slot();
        if requested >= self.entities.len() {
            self.entities.reserve(requested + 1 - self.entities.len());
            for pos in self.entities.len()..requested {
                self.entities.push(self.destroyed);
                self.destroyed = Entity::new(pos as u32, 0);
            }
            self.entities.push(hint);
            return hint;
        }

        if self.entities[requested].slot() == requested {
            tracing::warn!(?hint, "hinted entity slot is alive, creating a fresh entity");
            return self.create();
        }

        let next = self.entities[requested].index();
        if self.destroyed.slot() == requested {
            self.destroyed = Entity::new(next, self.destroyed.version());
        } else {
            let mut link = self.destroyed.slot();
            while self.entities[link].slot() != requested {
                link = self.entities[link].slot();
            }
            let version = self.entities[link].version();
            self.entities[link] = Entity::new(next, version);
        }
        self.entities[requested] = hint;
        hint
    }

    /// Creates `count` entities.
    pub fn create_many(&mut self, count: usize) -> Vec<Entity> {
        self.entities.reserve(count);
        (0..count).map(|_| self.create()).collect()
    }

    /// Destroys `entity`, removing all its components first.
    ///
    /// The slot is recycled with the next version.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn destroy(&mut self, entity: Entity) {
        self.destroy_with_version(entity, entity.next_version());
    }

    /// Destroys `entity` and recycles its slot with `version`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn destroy_with_version(&mut self, entity: Entity, version: u32) {
        assert!(self.valid(entity), "cannot destroy invalid {entity:?}");

        self.remove_all(entity);

        let slot = entity.slot();
        self.entities[slot] = Entity::new(self.destroyed.index(), version);
        self.destroyed = Entity::new(slot as u32, 0);
    }

    /// Destroys every entity yielded by `entities`.
    pub fn destroy_many<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        for entity in entities {
            self.destroy(entity);
        }
    }

    /// Destroys every alive entity. Destroy signals fire for every component.
    pub fn clear(&mut self) {
        let mut pos = self.entities.len();
        while pos > 0 {
            pos -= 1;
            let entity = self.entities[pos];
            if entity.slot() == pos {
                self.destroy(entity);
            }
        }
    }

    /// Calls `func` for every alive entity, last slot first.
    pub fn each<F>(&self, mut func: F)
    where
        F: FnMut(Entity),
    {
        for (pos, &entity) in self.entities.iter().enumerate().rev() {
            if entity.slot() == pos {
                func(entity);
            }
        }
    }

    /// Calls `func` for every alive entity with mutable registry access.
    ///
    /// Destroying the visited entity from `func` is allowed. Entities
    /// created during the walk are not visited.
    pub fn each_mut<F>(&mut self, mut func: F)
    where
        F: FnMut(&mut Registry, Entity),
    {
        let mut pos = self.entities.len();
        while pos > 0 {
            pos -= 1;
            let entity = self.entities[pos];
            if entity.slot() == pos {
                func(self, entity);
            }
        }
    }

    /// Checks if `entity` has no components at all. Slow, O(pools).
    #[must_use]
    pub fn orphan(&self, entity: Entity) -> bool {
        debug_assert!(self.valid(entity), "invalid {entity:?}");
        self.pools.iter().all(|pool| !pool.contains(entity))
    }

    /// Calls `func` for every alive entity without components.
    ///
    /// Slow, O(alive * pools). Intended for diagnostics.
    pub fn orphans<F>(&self, mut func: F)
    where
        F: FnMut(Entity),
    {
        self.each(|entity| {
            if self.orphan(entity) {
                func(entity);
            }
        });
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Returns the pool index for `T`, creating the pool on first use.
    pub(crate) fn assure<T: Component>(&mut self) -> usize {
        let type_id = TypeId::of::<T>();
        if let Some(&index) = self.index.get(&type_id) {
            return index;
        }

        let index = self.pools.len();
        self.pools.push(Pool::new::<T>(ComponentId::new(index), &self.config));
        self.index.insert(type_id, index);
        tracing::trace!(component = type_name::<T>(), index, "component pool created");
        index
    }

    #[inline]
    fn pool_index<T: Component>(&self) -> Option<usize> {
        self.index.get(&TypeId::of::<T>()).copied()
    }

    /// Pool positions for `type_ids`, or `None` if any pool does not exist.
    pub(crate) fn pool_indices(&self, type_ids: &[TypeId]) -> Option<Vec<usize>> {
        type_ids.iter().map(|id| self.index.get(id).copied()).collect()
    }

    /// Registers `T` and returns its registry-local id.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let index = self.assure::<T>();
        self.pools[index].id()
    }

    /// Returns the id of `T`, if it has been used in this registry.
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.pool_index::<T>().map(|index| self.pools[index].id())
    }

    /// Returns the typed storage of `T`, if it exists.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.pool_index::<T>().map(|index| self.pools[index].typed::<T>())
    }

    /// Returns the number of entities that have a `T`.
    #[must_use]
    pub fn len_of<T: Component>(&self) -> usize {
        self.storage::<T>().map_or(0, Storage::len)
    }

    fn publish(&mut self, pool: usize, event: Event, entity: Entity) {
        let signal = self.pools[pool].signal(event);
        if signal.is_empty() {
            return;
        }
        let listeners = signal.listeners();
        for listener in listeners.iter() {
            listener(self, entity);
        }
    }

    /// Attaches `value` to `entity` and publishes `on_construct`.
    ///
    /// Listeners observe the component as already attached.
    ///
    /// # Panics
    ///
    /// Panics if `entity` already has a `T`. Invalid entities are checked in
    /// debug builds.
    pub fn emplace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        debug_assert!(self.valid(entity), "invalid {entity:?}");

        let pool = self.assure::<T>();
        let storage = self.pools[pool].typed_mut::<T>();
        assert!(
            !storage.contains(entity),
            "{entity:?} already has a {}",
            type_name::<T>()
        );
        storage.emplace(entity, value);
        self.publish(pool, Event::Construct, entity);
        self.pools[pool].typed_mut::<T>().get_mut(entity)
    }

    /// Attaches a clone of `value` to every entity of `entities`.
    pub fn insert<T, I>(&mut self, entities: I, value: &T)
    where
        T: Component + Clone,
        I: IntoIterator<Item = Entity>,
    {
        for entity in entities {
            self.emplace(entity, value.clone());
        }
    }

    /// Attaches every `(entity, value)` pair.
    pub fn insert_from<T, I>(&mut self, pairs: I)
    where
        T: Component,
        I: IntoIterator<Item = (Entity, T)>,
    {
        let pairs = pairs.into_iter();
        self.reserve_pool::<T>(pairs.size_hint().0);
        for (entity, value) in pairs {
            self.emplace(entity, value);
        }
    }

    /// Replaces the component of `entity` if present, attaches it otherwise.
    pub fn emplace_or_replace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        if self.has::<T>(entity) {
            self.replace(entity, value)
        } else {
            self.emplace(entity, value)
        }
    }

    /// Overwrites the component of `entity` and publishes `on_update`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        self.patch(entity, move |component: &mut T| *component = value)
    }

    /// Mutates the component of `entity` in place and publishes `on_update`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`.
    pub fn patch<T, F>(&mut self, entity: Entity, func: F) -> &mut T
    where
        T: Component,
        F: FnOnce(&mut T),
    {
        let pool = self.expect_pool::<T>(entity);
        func(self.pools[pool].typed_mut::<T>().get_mut(entity));
        self.publish(pool, Event::Update, entity);
        self.pools[pool].typed_mut::<T>().get_mut(entity)
    }

    /// Returns the component of `entity`, attaching `value` first if absent.
    pub fn get_or_emplace<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        self.get_or_emplace_with(entity, || value)
    }

    /// Returns the component of `entity`, attaching `make()` first if absent.
    pub fn get_or_emplace_with<T, F>(&mut self, entity: Entity, make: F) -> &mut T
    where
        T: Component,
        F: FnOnce() -> T,
    {
        if self.has::<T>(entity) {
            let pool = self.assure::<T>();
            self.pools[pool].typed_mut::<T>().get_mut(entity)
        } else {
            self.emplace(entity, make())
        }
    }

    fn expect_pool<T: Component>(&self, entity: Entity) -> usize {
        match self.pool_index::<T>() {
            Some(pool) if self.pools[pool].contains(entity) => pool,
            _ => panic!("{entity:?} has no {}", type_name::<T>()),
        }
    }

    /// Detaches the `T` of `entity`, publishing `on_destroy` first.
    ///
    /// Listeners still observe the component while they run.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> T {
        let pool = self.expect_pool::<T>(entity);
        self.publish(pool, Event::Destroy, entity);
        self.pools[pool].typed_mut::<T>().remove(entity)
    }

    /// Detaches the `T` of `entity` if present.
    ///
    /// # Returns
    ///
    /// `true` if a component was removed.
    pub fn remove_if_exists<T: Component>(&mut self, entity: Entity) -> bool {
        match self.pool_index::<T>() {
            Some(pool) if self.pools[pool].contains(entity) => {
                self.remove_at(pool, entity);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove_at(&mut self, pool: usize, entity: Entity) {
        self.publish(pool, Event::Destroy, entity);
        self.pools[pool].storage.erase(entity);
    }

    /// Detaches every component of `entity`, last registered type first.
    pub fn remove_all(&mut self, entity: Entity) {
        debug_assert!(self.valid(entity), "invalid {entity:?}");

        for pool in (0..self.pools.len()).rev() {
            if self.pools[pool].contains(entity) {
                self.remove_at(pool, entity);
            }
        }
    }

    /// Detaches every `T`, publishing `on_destroy` for each.
    pub fn clear_pool<T: Component>(&mut self) {
        let Some(pool) = self.pool_index::<T>() else {
            return;
        };
        while let Some(&entity) = self.pools[pool].set().entities().last() {
            self.remove_at(pool, entity);
        }
    }

    /// Checks if `entity` has a `T`.
    #[inline]
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|storage| storage.contains(entity))
    }

    /// Checks if `entity` has every component of `Q`.
    #[must_use]
    pub fn all_of<Q: ComponentSet>(&self, entity: Entity) -> bool {
        Q::type_ids().iter().all(|id| {
            self.index
                .get(id)
                .is_some_and(|&pool| self.pools[pool].contains(entity))
        })
    }

    /// Checks if `entity` has at least one component of `Q`.
    #[must_use]
    pub fn any_of<Q: ComponentSet>(&self, entity: Entity) -> bool {
        Q::type_ids().iter().any(|id| {
            self.index
                .get(id)
                .is_some_and(|&pool| self.pools[pool].contains(entity))
        })
    }

    /// Returns the `T` of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        let pool = self.expect_pool::<T>(entity);
        self.pools[pool].typed::<T>().get(entity)
    }

    /// Returns the `T` of `entity` mutably. No signal is published.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        let pool = self.expect_pool::<T>(entity);
        self.pools[pool].typed_mut::<T>().get_mut(entity)
    }

    /// Returns the `T` of `entity`, if any.
    #[must_use]
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.try_get(entity)
    }

    /// Returns the `T` of `entity` mutably, if any.
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let pool = self.pool_index::<T>()?;
        self.pools[pool].typed_mut::<T>().try_get_mut(entity)
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Listeners called after a `T` is attached.
    pub fn on_construct<T: Component>(&mut self) -> Sink<'_> {
        let pool = self.assure::<T>();
        Sink::new(self.pools[pool].signal_mut(Event::Construct))
    }

    /// Listeners called after a `T` is patched or replaced.
    pub fn on_update<T: Component>(&mut self) -> Sink<'_> {
        let pool = self.assure::<T>();
        Sink::new(self.pools[pool].signal_mut(Event::Update))
    }

    /// Listeners called before a `T` is detached.
    pub fn on_destroy<T: Component>(&mut self) -> Sink<'_> {
        let pool = self.assure::<T>();
        Sink::new(self.pools[pool].signal_mut(Event::Destroy))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Read-only view over every entity that has all of `Q`.
    ///
    /// Empty if any type of `Q` has never been used.
    #[must_use]
    pub fn view<Q: ComponentSet>(&self) -> View<'_, Q> {
        self.view_excluding::<Q, ()>()
    }

    /// Read-only view over entities that have all of `Q` and none of `X`.
    #[must_use]
    pub fn view_excluding<Q: ComponentSet, X: ComponentSet>(&self) -> View<'_, Q> {
        let storages = self
            .pool_indices(&Q::type_ids())
            .map(|indices| Q::fetch(&mut indices.iter().map(|&pool| &self.pools[pool])));
        let excluded = X::type_ids()
            .iter()
            .filter_map(|id| self.index.get(id))
            .map(|&pool| self.pools[pool].set())
            .collect();
        View::new(self, storages, excluded)
    }

    /// Mutable view over every entity that has all of `Q`.
    pub fn view_mut<Q: ComponentSet>(&mut self) -> ViewMut<'_, Q> {
        self.view_mut_excluding::<Q, ()>()
    }

    /// Mutable view over entities that have all of `Q` and none of `X`.
    ///
    /// # Panics
    ///
    /// Panics if a component type appears twice across `Q` and `X`.
    pub fn view_mut_excluding<Q: ComponentSet, X: ComponentSet>(&mut self) -> ViewMut<'_, Q> {
        let mut indices = Q::register(self);
        indices.extend(X::register(self));

        let mut pools = disjoint_mut(&mut self.pools, &indices).into_iter();
        let parts = Q::fetch_mut(&mut pools);
        let excluded: Vec<&SparseSet> = pools.map(|pool| &*pool).map(Pool::set).collect();
        ViewMut::new(parts, excluded)
    }

    /// Type-erased view over entities that have every component in
    /// `include` and none in `exclude`.
    ///
    /// Unknown ids in `include` make the view empty; unknown ids in
    /// `exclude` are ignored.
    #[must_use]
    pub fn runtime_view(&self, include: &[ComponentId], exclude: &[ComponentId]) -> RuntimeView<'_> {
        let pools: Option<Vec<&SparseSet>> = include
            .iter()
            .map(|id| self.pools.get(id.index()).map(Pool::set))
            .collect();
        let excluded = exclude
            .iter()
            .filter_map(|id| self.pools.get(id.index()).map(Pool::set))
            .collect();
        RuntimeView::new(pools.unwrap_or_default(), excluded)
    }

    /// Returns the group owning `O`, observing `G` and excluding `X`,
    /// creating and populating it on first use.
    ///
    /// # Panics
    ///
    /// Panics if a type of `O` is already owned by a different group, or
    /// if `O` and `G` are both empty.
    pub fn group<O, G, X>(&mut self) -> Group<'_, O, G, X>
    where
        O: ComponentSet,
        G: ComponentSet,
        X: ComponentSet,
    {
        let owned = O::register(self);
        let get = G::register(self);
        let exclude = X::register(self);
        let id = group::assure(self, owned.clone(), get.clone(), exclude);
        Group::new(self, id, owned, get)
    }

    /// Returns the group for this signature if it was already created.
    pub fn group_if_exists<O, G, X>(&mut self) -> Option<Group<'_, O, G, X>>
    where
        O: ComponentSet,
        G: ComponentSet,
        X: ComponentSet,
    {
        let owned = self.pool_indices(&O::type_ids())?;
        let get = self.pool_indices(&G::type_ids())?;
        let exclude = self.pool_indices(&X::type_ids())?;
        let id = group::find(self, &owned, &get, &exclude)?;
        Some(Group::new(self, id, owned, get))
    }

    /// Checks if a group with this signature could be sorted.
    #[must_use]
    pub fn sortable<O, G, X>(&self) -> bool
    where
        O: ComponentSet,
        G: ComponentSet,
        X: ComponentSet,
    {
        let arity = O::COUNT + G::COUNT + X::COUNT;
        match self.pool_indices(&O::type_ids()) {
            Some(owned) => owned.iter().all(|&pool| {
                let pool = &self.pools[pool];
                pool.owner.is_none() || pool.super_arity == arity
            }),
            None => true,
        }
    }

    /// Checks if the pool of `T` is owned by a group.
    #[must_use]
    pub fn owned<T: Component>(&self) -> bool {
        self.pool_index::<T>().is_some_and(|pool| self.pools[pool].is_owned())
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    fn sortable_pool<T: Component>(&mut self) -> usize {
        let pool = self.assure::<T>();
        assert!(
            !self.pools[pool].is_owned(),
            "cannot sort {}: the pool is owned by a group",
            type_name::<T>()
        );
        pool
    }

    /// Sorts the pool of `T` so that iteration follows `compare`.
    ///
    /// # Panics
    ///
    /// Panics if the pool is owned by a group.
    pub fn sort<T, F>(&mut self, compare: F)
    where
        T: Component,
        F: FnMut(&T, &T) -> Ordering,
    {
        self.sort_with(compare, SortAlgorithm::Standard);
    }

    /// [`Registry::sort`] with an explicit algorithm.
    ///
    /// # Panics
    ///
    /// Panics if the pool is owned by a group.
    pub fn sort_with<T, F>(&mut self, compare: F, algo: SortAlgorithm)
    where
        T: Component,
        F: FnMut(&T, &T) -> Ordering,
    {
        let pool = self.sortable_pool::<T>();
        self.pools[pool].typed_mut::<T>().sort_by(compare, algo);
    }

    /// Sorts the pool of `T` by entity so that iteration follows `compare`.
    ///
    /// # Panics
    ///
    /// Panics if the pool is owned by a group.
    pub fn sort_by_entity<T, F>(&mut self, compare: F)
    where
        T: Component,
        F: FnMut(Entity, Entity) -> Ordering,
    {
        let pool = self.sortable_pool::<T>();
        self.pools[pool]
            .typed_mut::<T>()
            .sort_by_entity(compare, SortAlgorithm::Standard);
    }

    /// Sorts the pool of `T` in linear time by a 32-bit key.
    ///
    /// # Panics
    ///
    /// Panics if the pool is owned by a group.
    pub fn sort_by_radix<T, K>(&mut self, key: K)
    where
        T: Component,
        K: FnMut(&T) -> u32,
    {
        let pool = self.sortable_pool::<T>();
        self.pools[pool].typed_mut::<T>().sort_by_radix(key);
    }

    /// Reorders the pool of `To` so that entities shared with the pool of
    /// `From` are visited first and in the same order.
    ///
    /// # Panics
    ///
    /// Panics if the pool of `To` is owned by a group, or if `To` and
    /// `From` are the same type.
    pub fn sort_as<To: Component, From: Component>(&mut self) {
        let to = self.sortable_pool::<To>();
        let from = self.assure::<From>();

        let mut pools = disjoint_mut(&mut self.pools, &[to, from]).into_iter();
        if let (Some(to), Some(from)) = (pools.next(), pools.next()) {
            to.storage.respect(from.set());
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Calls `func` for every component type attached to `entity`, last
    /// registered type first.
    pub fn visit<F>(&self, entity: Entity, mut func: F)
    where
        F: FnMut(ComponentInfo),
    {
        for pool in self.pools.iter().rev() {
            if pool.contains(entity) {
                func(pool.info());
            }
        }
    }

    /// Calls `func` for every component type known to the registry, last
    /// registered type first.
    pub fn visit_pools<F>(&self, mut func: F)
    where
        F: FnMut(ComponentInfo),
    {
        for pool in self.pools.iter().rev() {
            func(pool.info());
        }
    }

    // =========================================================================
    // Context variables
    // =========================================================================

    /// Stores a context variable, replacing any previous value of type `T`.
    pub fn set_ctx<T: Component>(&mut self, value: T) -> &mut T {
        self.context.set(value)
    }

    /// Returns the context variable of type `T`.
    #[must_use]
    pub fn ctx<T: Component>(&self) -> Option<&T> {
        self.context.get()
    }

    /// Returns the context variable of type `T` mutably.
    pub fn ctx_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.context.get_mut()
    }

    /// Returns the context variable of type `T`, inserting `make()` if absent.
    pub fn ctx_or_insert_with<T, F>(&mut self, make: F) -> &mut T
    where
        T: Component,
        F: FnOnce() -> T,
    {
        self.context.get_or_insert_with(make)
    }

    /// Removes and returns the context variable of type `T`.
    pub fn unset_ctx<T: Component>(&mut self) -> Option<T> {
        self.context.remove()
    }

    /// Checks if a context variable of type `T` is set.
    #[must_use]
    pub fn contains_ctx<T: Component>(&self) -> bool {
        self.context.contains::<T>()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Captures the entity slots and free list.
    #[must_use]
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot::new(self.entities.clone(), self.destroyed)
    }

    /// Replaces the entity slots and free list with `snapshot`.
    ///
    /// Components are not part of the snapshot; a serializer reattaches
    /// them afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RegistryNotEmpty`] if entities are alive, or
    /// [`EcsError::MalformedSnapshot`] if the snapshot is inconsistent.
    pub fn restore(&mut self, snapshot: EntitySnapshot) -> EcsResult<()> {
        let alive = self.alive();
        if alive != 0 {
            return Err(EcsError::RegistryNotEmpty { alive });
        }
        snapshot.validate()?;

        let (entities, destroyed) = snapshot.into_parts();
        self.entities = entities;
        self.destroyed = destroyed;
        tracing::info!(size = self.entities.len(), alive = self.alive(), "entity snapshot restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32);

    #[test]
    fn test_create_sequential() {
        let mut registry = Registry::new();
        let a = registry.create();
        let b = registry.create();
        assert_eq!(a, Entity::new(0, 0));
        assert_eq!(b, Entity::new(1, 0));
        assert_eq!(registry.size(), 2);
        assert_eq!(registry.alive(), 2);
    }

    #[test]
    fn test_recycling_bumps_version() {
        let mut registry = Registry::new();
        let first = registry.create();
        registry.destroy(first);
        assert!(!registry.valid(first));
        assert_eq!(registry.current(first), 1);

        let second = registry.create();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.version(), 1);
        assert_ne!(first, second);
        assert!(registry.valid(second));
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut registry = Registry::new();
        let entities = registry.create_many(4);
        registry.destroy(entities[1]);
        registry.destroy(entities[3]);
        assert_eq!(registry.alive(), 2);

        assert_eq!(registry.create().index(), 3);
        assert_eq!(registry.create().index(), 1);
        assert_eq!(registry.create().index(), 4);
    }

    #[test]
    fn test_destroy_with_version() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.destroy_with_version(entity, 42);
        assert_eq!(registry.create(), Entity::new(0, 42));
    }

    #[test]
    fn test_version_wraps_around() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.destroy_with_version(entity, Entity::VERSION_MASK);
        let last = registry.create();
        assert_eq!(last.version(), Entity::VERSION_MASK);
        registry.destroy(last);
        assert_eq!(registry.create().version(), 0);
    }

    #[test]
    fn test_hint_past_end_pads_free_list() {
        let mut registry = Registry::new();
        let hinted = registry.create_with_hint(Entity::new(3, 5));
        assert_eq!(hinted, Entity::new(3, 5));
        assert!(registry.valid(hinted));
        assert_eq!(registry.size(), 4);
        assert_eq!(registry.alive(), 1);

        let mut recycled: Vec<u32> = (0..3).map(|_| registry.create().index()).collect();
        recycled.sort_unstable();
        assert_eq!(recycled, vec![0, 1, 2]);
        assert_eq!(registry.create().index(), 4);
    }

    #[test]
    fn test_hint_splices_free_slot() {
        let mut registry = Registry::new();
        let entities = registry.create_many(4);
        for &entity in &entities {
            registry.destroy(entity);
        }

        let hinted = registry.create_with_hint(Entity::new(1, 9));
        assert_eq!(hinted, Entity::new(1, 9));
        assert_eq!(registry.alive(), 1);

        let mut rest: Vec<Entity> = (0..3).map(|_| registry.create()).collect();
        rest.sort_unstable_by_key(|e| e.index());
        assert_eq!(rest, vec![Entity::new(0, 1), Entity::new(2, 1), Entity::new(3, 1)]);
    }

    #[test]
    fn test_hint_on_alive_slot_falls_back() {
        let mut registry = Registry::new();
        let alive = registry.create();
        let other = registry.create_with_hint(Entity::new(alive.index(), 3));
        assert_ne!(other.index(), alive.index());
        assert!(registry.valid(alive));
        assert!(registry.valid(other));
    }

    #[test]
    fn test_each_skips_free_slots() {
        let mut registry = Registry::new();
        let entities = registry.create_many(5);
        registry.destroy(entities[0]);
        registry.destroy(entities[3]);

        let mut seen = Vec::new();
        registry.each(|e| seen.push(e));
        assert_eq!(seen, vec![entities[4], entities[2], entities[1]]);
    }

    #[test]
    fn test_each_mut_can_destroy_current() {
        let mut registry = Registry::new();
        let entities = registry.create_many(6);
        for &entity in &entities {
            registry.emplace(entity, Position(entity.index() as i32));
        }

        registry.each_mut(|registry, entity| {
            if registry.get::<Position>(entity).0 % 2 == 0 {
                registry.destroy(entity);
            }
        });
        assert_eq!(registry.alive(), 3);
        assert_eq!(registry.len_of::<Position>(), 3);
    }

    #[test]
    fn test_emplace_get_remove() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, Position(1));
        assert!(registry.has::<Position>(entity));
        assert!(!registry.has::<Velocity>(entity));
        assert_eq!(registry.get::<Position>(entity), &Position(1));

        registry.get_mut::<Position>(entity).0 = 4;
        assert_eq!(registry.remove::<Position>(entity), Position(4));
        assert!(registry.try_get::<Position>(entity).is_none());
        assert!(!registry.remove_if_exists::<Position>(entity));
    }

    #[test]
    #[should_panic(expected = "already has")]
    fn test_double_emplace_panics() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, Position(1));
        registry.emplace(entity, Position(2));
    }

    #[test]
    fn test_all_of_any_of() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, Position(0));
        assert!(registry.all_of::<(Position,)>(entity));
        assert!(!registry.all_of::<(Position, Velocity)>(entity));
        assert!(registry.any_of::<(Position, Velocity)>(entity));
        assert!(!registry.any_of::<(Velocity,)>(entity));
        assert!(registry.all_of::<()>(entity));
    }

    #[test]
    fn test_patch_and_replace_publish_update() {
        let mut registry = Registry::new();
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        registry
            .on_update::<Position>()
            .connect(move |_, _| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            });

        let entity = registry.create();
        registry.emplace(entity, Position(0));
        registry.patch::<Position, _>(entity, |p| p.0 += 5);
        registry.replace(entity, Position(9));
        registry.emplace_or_replace(entity, Position(11));

        assert_eq!(updates.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(registry.get::<Position>(entity), &Position(11));
    }

    #[test]
    fn test_get_or_emplace() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.get_or_emplace(entity, Velocity(3)).0 += 1;
        registry.get_or_emplace(entity, Velocity(100)).0 += 1;
        assert_eq!(registry.get::<Velocity>(entity), &Velocity(5));
    }

    #[test]
    fn test_destroy_removes_components() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, Position(0));
        registry.emplace(entity, Velocity(0));
        registry.destroy(entity);
        assert_eq!(registry.len_of::<Position>(), 0);
        assert_eq!(registry.len_of::<Velocity>(), 0);
    }

    #[test]
    fn test_clear_pool_and_clear() {
        let mut registry = Registry::new();
        let entities = registry.create_many(3);
        registry.insert(entities.iter().copied(), &Position(7));
        registry.clear_pool::<Position>();
        assert_eq!(registry.len_of::<Position>(), 0);
        assert_eq!(registry.alive(), 3);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.size(), 3);
    }

    #[test]
    fn test_orphans() {
        let mut registry = Registry::new();
        let entities = registry.create_many(3);
        registry.emplace(entities[1], Position(0));

        let mut orphans = Vec::new();
        registry.orphans(|e| orphans.push(e));
        assert_eq!(orphans, vec![entities[2], entities[0]]);
        assert!(!registry.orphan(entities[1]));
    }

    #[test]
    fn test_visit() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, Position(0));
        registry.emplace(entity, Velocity(0));
        let _ = registry.register::<u64>();

        let mut names = Vec::new();
        registry.visit(entity, |info| names.push(info.name));
        assert_eq!(names, vec![type_name::<Velocity>(), type_name::<Position>()]);

        let mut count = 0;
        registry.visit_pools(|_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_sort_pool() {
        let mut registry = Registry::new();
        for value in [3, 1, 2] {
            let entity = registry.create();
            registry.emplace(entity, Position(value));
        }
        registry.sort::<Position, _>(|l, r| l.0.cmp(&r.0));

        let values: Vec<i32> = registry
            .storage::<Position>()
            .map(|s| s.iter().map(|(_, p)| p.0).collect())
            .unwrap_or_default();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_as() {
        let mut registry = Registry::new();
        let entities = registry.create_many(4);
        for &entity in &entities {
            registry.emplace(entity, Velocity(0));
        }
        for &entity in entities.iter().rev() {
            registry.emplace(entity, Position(0));
        }
        registry.sort_as::<Velocity, Position>();

        let positions: Vec<Entity> = registry.storage::<Position>().map(|s| s.set().iter().collect()).unwrap_or_default();
        let velocities: Vec<Entity> = registry.storage::<Velocity>().map(|s| s.set().iter().collect()).unwrap_or_default();
        assert_eq!(positions, velocities);
    }

    #[test]
    fn test_context_variables() {
        let mut registry = Registry::new();
        assert!(registry.ctx::<u32>().is_none());
        registry.set_ctx(5u32);
        *registry.ctx_mut::<u32>().unwrap() += 1;
        assert_eq!(registry.ctx::<u32>(), Some(&6));
        assert_eq!(*registry.ctx_or_insert_with(|| 0u32), 6);
        assert_eq!(registry.unset_ctx::<u32>(), Some(6));
        assert!(!registry.contains_ctx::<u32>());
    }

    #[test]
    fn test_with_config() {
        let config = RegistryConfig {
            sparse_page_size: 64,
            entity_capacity: 128,
            pool_capacity: 16,
        };
        let mut registry = Registry::with_config(config).unwrap();
        assert!(registry.capacity() >= 128);
        registry.reserve_pool::<Position>(0);
        assert!(registry.storage::<Position>().map_or(0, Storage::capacity) >= 16);

        let bad = RegistryConfig {
            sparse_page_size: 3,
            ..RegistryConfig::default()
        };
        assert!(Registry::with_config(bad).is_err());
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
