//! # Component Pools
//!
//! One pool per component type: the type-erased storage, its three
//! lifecycle signals and the ownership record used by groups.

use std::any::{type_name, TypeId};
use std::fmt;

use super::component::{Component, ComponentId, ComponentInfo};
use super::entity::Entity;
use super::signal::Signal;
use super::sparse_set::SparseSet;
use super::storage::{ErasedStorage, Storage};
use crate::config::RegistryConfig;

/// Lifecycle event published by a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Construct,
    Update,
    Destroy,
}

/// Type-erased storage of one component type, owned by a registry.
pub struct Pool {
    id: ComponentId,
    type_id: TypeId,
    name: &'static str,
    size: usize,
    pub(crate) storage: Box<dyn ErasedStorage>,
    pub(crate) on_construct: Signal,
    pub(crate) on_update: Signal,
    pub(crate) on_destroy: Signal,
    /// Group that owns this pool, if any.
    pub(crate) owner: Option<usize>,
    /// Total arity (owned + get + exclude) of the owning group.
    pub(crate) super_arity: usize,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("len", &self.len())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Pool {
    pub(crate) fn new<T: Component>(id: ComponentId, config: &RegistryConfig) -> Self {
        let mut storage = Storage::<T>::with_page_size(config.sparse_page_size);
        storage.reserve(config.pool_capacity);

        Self {
            id,
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
            storage: Box::new(storage),
            on_construct: Signal::new(),
            on_update: Signal::new(),
            on_destroy: Signal::new(),
            owner: None,
            super_arity: 0,
        }
    }

    /// Returns the registry-local id of the component type.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the component's type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Returns the entity set of the pool.
    #[inline]
    #[must_use]
    pub fn set(&self) -> &SparseSet {
        self.storage.set()
    }

    /// Returns the number of components stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.set().len()
    }

    /// Checks if the pool is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.set().is_empty()
    }

    /// Checks if `entity` has a component in this pool.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.storage.set().contains(entity)
    }

    /// Checks if a group owns this pool.
    #[inline]
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// Describes the pool for diagnostics and serializers.
    #[must_use]
    pub fn info(&self) -> ComponentInfo {
        ComponentInfo {
            id: self.id,
            type_id: self.type_id,
            name: self.name,
            size: self.size,
            len: self.len(),
        }
    }

    pub(crate) fn signal(&self, event: Event) -> &Signal {
        match event {
            Event::Construct => &self.on_construct,
            Event::Update => &self.on_update,
            Event::Destroy => &self.on_destroy,
        }
    }

    pub(crate) fn signal_mut(&mut self, event: Event) -> &mut Signal {
        match event {
            Event::Construct => &mut self.on_construct,
            Event::Update => &mut self.on_update,
            Event::Destroy => &mut self.on_destroy,
        }
    }

    /// Downcasts to the typed storage.
    #[inline]
    pub(crate) fn typed<T: Component>(&self) -> &Storage<T> {
        match self.storage.as_any().downcast_ref::<Storage<T>>() {
            Some(storage) => storage,
            None => unreachable!("pool {} does not hold {}", self.name, type_name::<T>()),
        }
    }

    /// Downcasts to the typed storage, mutably.
    #[inline]
    pub(crate) fn typed_mut<T: Component>(&mut self) -> &mut Storage<T> {
        let name = self.name;
        match self.storage.as_any_mut().downcast_mut::<Storage<T>>() {
            Some(storage) => storage,
            None => unreachable!("pool {name} does not hold {}", type_name::<T>()),
        }
    }

    /// Splits the typed storage into its entity set and component slice.
    #[inline]
    pub(crate) fn split_mut<T: Component>(&mut self) -> (&SparseSet, &mut [T]) {
        self.typed_mut::<T>().split_mut()
    }
}

/// Borrows the pools at `indices` mutably, in the requested order.
///
/// # Panics
///
/// Panics if an index appears twice or is out of range.
pub(crate) fn disjoint_mut<'a>(pools: &'a mut [Pool], indices: &[usize]) -> Vec<&'a mut Pool> {
    let mut slots: Vec<Option<&'a mut Pool>> = pools.iter_mut().map(Some).collect();
    indices
        .iter()
        .map(|&index| match slots.get_mut(index).and_then(Option::take) {
            Some(pool) => pool,
            None => panic!("component pool {index} requested twice in one query"),
        })
        .collect()
}
