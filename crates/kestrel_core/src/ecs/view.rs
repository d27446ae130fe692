//! # Views
//!
//! Non-owning queries over entities that have a given set of components.
//!
//! A view performs no bookkeeping of its own. Iteration walks the smallest
//! of the involved pools (the driver) and filters every candidate against
//! the others:
//!
//! ```text
//! Position:  [ e0 e1 e2 e3 e4 ]
//! Velocity:  [ e3 e1 ]            <- driver, 2 candidates
//! Frozen:    [ e1 ]               <- excluded
//!
//! view_excluding::<(Position, Velocity), (Frozen,)>  =>  e3
//! ```
//!
//! Views are cheap to create and should not be stored. Attaching or
//! removing components while a view is alive is prevented by the borrow
//! checker.

use std::any::{type_name, TypeId};

use super::component::{Component, ComponentSet};
use super::entity::Entity;
use super::registry::Registry;
use super::sparse_set::{SetIter, SparseSet};

/// Include and exclude sets shared by every kind of view.
#[derive(Clone, Debug, Default)]
pub(crate) struct Filter<'a> {
    include: Vec<&'a SparseSet>,
    exclude: Vec<&'a SparseSet>,
}

impl<'a> Filter<'a> {
    pub(crate) fn new(include: Vec<&'a SparseSet>, exclude: Vec<&'a SparseSet>) -> Self {
        Self { include, exclude }
    }

    /// The smallest included set.
    pub(crate) fn driver(&self) -> Option<&'a SparseSet> {
        self.include.iter().copied().min_by_key(|set| set.len())
    }

    pub(crate) fn accepts(&self, entity: Entity) -> bool {
        self.include.iter().all(|set| set.contains(entity))
            && !self.exclude.iter().any(|set| set.contains(entity))
    }

    pub(crate) fn size_hint(&self) -> usize {
        self.driver().map_or(0, SparseSet::len)
    }

    pub(crate) fn iter(&self) -> ViewIter<'_> {
        self.iter_over(self.driver())
    }

    pub(crate) fn iter_over(&self, driver: Option<&'a SparseSet>) -> ViewIter<'_> {
        ViewIter {
            candidates: driver.map(SparseSet::iter),
            filter: self,
        }
    }
}

/// Iterator over the entities of a view.
///
/// Yields driver entities from the last packed position to the first.
pub struct ViewIter<'v> {
    candidates: Option<SetIter<'v>>,
    filter: &'v Filter<'v>,
}

impl Iterator for ViewIter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let filter = self.filter;
        self.candidates.as_mut()?.find(|&entity| filter.accepts(entity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.candidates.as_ref().map_or(0, |iter| iter.len());
        (0, Some(upper))
    }
}

fn position_of<T: Component, Q: ComponentSet>() -> usize {
    let target = TypeId::of::<T>();
    match Q::type_ids().iter().position(|&id| id == target) {
        Some(pos) => pos,
        None => panic!("{} is not part of the view", type_name::<T>()),
    }
}

/// Read-only view over entities that have every component of `Q`.
///
/// Created by [`Registry::view`](crate::Registry::view) and
/// [`Registry::view_excluding`](crate::Registry::view_excluding).
pub struct View<'a, Q: ComponentSet> {
    registry: &'a Registry,
    /// `None` when a component type of `Q` has no pool yet.
    storages: Option<Q::Storages<'a>>,
    filter: Filter<'a>,
}

impl<'a, Q: ComponentSet> View<'a, Q> {
    pub(crate) fn new(
        registry: &'a Registry,
        storages: Option<Q::Storages<'a>>,
        exclude: Vec<&'a SparseSet>,
    ) -> Self {
        let include = storages.map(Q::sets).unwrap_or_default();
        Self {
            registry,
            storages,
            filter: Filter::new(include, exclude),
        }
    }

    /// Upper bound on the number of entities, the size of the smallest pool.
    #[must_use]
    pub fn size_hint(&self) -> usize {
        self.filter.size_hint()
    }

    /// Checks if `entity` is part of the view.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.filter.driver().is_some() && self.filter.accepts(entity)
    }

    /// Iterates the entities of the view.
    pub fn iter(&self) -> ViewIter<'_> {
        self.filter.iter()
    }

    /// Calls `func` with every entity and its components.
    pub fn each<F>(&self, mut func: F)
    where
        F: FnMut(Entity, Q::Refs<'a>),
    {
        let Some(storages) = self.storages else {
            return;
        };
        for entity in self.filter.iter() {
            func(entity, Q::get(storages, entity));
        }
    }

    /// Like [`View::each`], but follows the packed order of `T`'s pool.
    ///
    /// Useful after sorting that pool.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not part of `Q`.
    pub fn each_ordered_by<T, F>(&self, mut func: F)
    where
        T: Component,
        F: FnMut(Entity, Q::Refs<'a>),
    {
        let pos = position_of::<T, Q>();
        let Some(storages) = self.storages else {
            return;
        };
        let driver = Q::sets(storages)[pos];
        for entity in self.filter.iter_over(Some(driver)) {
            func(entity, Q::get(storages, entity));
        }
    }

    /// Returns the components of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not part of the view.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Q::Refs<'a> {
        match self.try_get(entity) {
            Some(refs) => refs,
            None => panic!("{entity:?} is not part of the view"),
        }
    }

    /// Returns the components of `entity`, if it is part of the view.
    #[must_use]
    pub fn try_get(&self, entity: Entity) -> Option<Q::Refs<'a>> {
        let storages = self.storages?;
        self.filter
            .accepts(entity)
            .then(|| Q::get(storages, entity))
    }

    /// Returns a single component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not part of `Q` or `entity` is not part of the view.
    #[must_use]
    pub fn component<T: Component>(&self, entity: Entity) -> &'a T {
        let _ = position_of::<T, Q>();
        assert!(self.contains(entity), "{entity:?} is not part of the view");
        self.registry.get::<T>(entity)
    }
}

impl<'v, 'a, Q: ComponentSet> IntoIterator for &'v View<'a, Q> {
    type Item = Entity;
    type IntoIter = ViewIter<'v>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Mutable view over entities that have every component of `Q`.
///
/// Created by [`Registry::view_mut`](crate::Registry::view_mut) and
/// [`Registry::view_mut_excluding`](crate::Registry::view_mut_excluding).
/// Component pools are created on demand, so a mutable view is never
/// missing a pool.
pub struct ViewMut<'a, Q: ComponentSet> {
    parts: Q::Parts<'a>,
    filter: Filter<'a>,
}

impl<'a, Q: ComponentSet> ViewMut<'a, Q> {
    pub(crate) fn new(parts: Q::Parts<'a>, exclude: Vec<&'a SparseSet>) -> Self {
        let include = Q::part_sets(&parts);
        Self {
            parts,
            filter: Filter::new(include, exclude),
        }
    }

    /// Upper bound on the number of entities, the size of the smallest pool.
    #[must_use]
    pub fn size_hint(&self) -> usize {
        self.filter.size_hint()
    }

    /// Checks if `entity` is part of the view.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.filter.accepts(entity)
    }

    /// Iterates the entities of the view.
    pub fn iter(&self) -> ViewIter<'_> {
        self.filter.iter()
    }

    /// Calls `func` with every entity and mutable access to its components.
    pub fn each<F>(&mut self, func: F)
    where
        F: FnMut(Entity, Q::RefsMut<'_>),
    {
        let driver = self.filter.driver();
        self.each_over(driver, func);
    }

    /// Like [`ViewMut::each`], but follows the packed order of `T`'s pool.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not part of `Q`.
    pub fn each_ordered_by<T, F>(&mut self, func: F)
    where
        T: Component,
        F: FnMut(Entity, Q::RefsMut<'_>),
    {
        let driver = Q::part_sets(&self.parts)[position_of::<T, Q>()];
        self.each_over(Some(driver), func);
    }

    fn each_over<F>(&mut self, driver: Option<&'a SparseSet>, mut func: F)
    where
        F: FnMut(Entity, Q::RefsMut<'_>),
    {
        let Some(driver) = driver else {
            return;
        };
        for entity in driver.iter() {
            if self.filter.accepts(entity) {
                func(entity, Q::get_mut(&mut self.parts, entity));
            }
        }
    }

    /// Returns mutable access to the components of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not part of the view.
    pub fn get(&mut self, entity: Entity) -> Q::RefsMut<'_> {
        assert!(self.filter.accepts(entity), "{entity:?} is not part of the view");
        Q::get_mut(&mut self.parts, entity)
    }

    /// Returns mutable access to the components of `entity`, if it is part
    /// of the view.
    pub fn try_get(&mut self, entity: Entity) -> Option<Q::RefsMut<'_>> {
        if self.filter.accepts(entity) {
            Some(Q::get_mut(&mut self.parts, entity))
        } else {
            None
        }
    }
}
