//! # Groups
//!
//! Registry-maintained intersections, kept up to date by pool signals.
//!
//! ## Owning Groups
//!
//! An owning group physically reorders the pools it owns so that the
//! entities of the group sit at the front of every owned pool, in the same
//! order:
//!
//! ```text
//! Position:  [ e1 e2 | e0 e4 ]
//! Velocity:  [ e1 e2 | e3 ]
//!              ^^^^^
//!              len = 2
//! ```
//!
//! Iterating the group is a plain indexed walk over `0..len` with no
//! membership test. Joining swaps the entity into position `len` of every
//! owned pool and grows the prefix; leaving swaps it to `len - 1` and
//! shrinks it. A pool can be owned by at most one group.
//!
//! ## Non-owning Groups
//!
//! Without owned types, the group keeps a private [`SparseSet`] of its
//! members instead.

use std::any::type_name;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use super::algorithm::SortAlgorithm;
use super::component::{Component, ComponentSet};
use super::entity::Entity;
use super::pool::{disjoint_mut, Event, Pool};
use super::registry::Registry;
use super::signal::Listener;
use super::sparse_set::{SetIter, SparseSet};

/// Membership storage of a group.
pub(crate) enum GroupKind {
    /// Members are the first `len` entries of every owned pool.
    Owning { len: usize },
    /// Members are kept in a private set.
    NonOwning { set: SparseSet },
}

/// Group handler state, owned by the registry.
pub(crate) struct GroupData {
    pub(crate) owned: Vec<usize>,
    pub(crate) get: Vec<usize>,
    pub(crate) exclude: Vec<usize>,
    /// Sorted copies of the three lists, for memoization.
    signature: [Vec<usize>; 3],
    pub(crate) kind: GroupKind,
}

fn signature(owned: &[usize], get: &[usize], exclude: &[usize]) -> [Vec<usize>; 3] {
    [owned, get, exclude].map(|list| {
        let mut list = list.to_vec();
        list.sort_unstable();
        list
    })
}

/// Looks up an existing group by its pool lists, in any order.
pub(crate) fn find(
    registry: &Registry,
    owned: &[usize],
    get: &[usize],
    exclude: &[usize],
) -> Option<usize> {
    let wanted = signature(owned, get, exclude);
    registry.groups.iter().position(|group| group.signature == wanted)
}

/// Returns the group for the given pools, creating and populating it if
/// it does not exist yet.
///
/// # Panics
///
/// Panics if an owned pool already belongs to another group, if a pool is
/// listed twice, or if `owned` and `get` are both empty.
pub(crate) fn assure(
    registry: &mut Registry,
    owned: Vec<usize>,
    get: Vec<usize>,
    exclude: Vec<usize>,
) -> usize {
    if let Some(id) = find(registry, &owned, &get, &exclude) {
        return id;
    }

    assert!(
        !owned.is_empty() || !get.is_empty(),
        "a group needs at least one owned or observed component"
    );
    let mut all: Vec<usize> = owned.iter().chain(&get).chain(&exclude).copied().collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(
        all.len(),
        owned.len() + get.len() + exclude.len(),
        "a component type appears twice in one group"
    );
    for &pool in &owned {
        assert!(
            !registry.pools[pool].is_owned(),
            "{} is already owned by another group",
            registry.pools[pool].type_name()
        );
    }

    let id = registry.groups.len();
    let arity = all.len();
    for &pool in &owned {
        registry.pools[pool].owner = Some(id);
        registry.pools[pool].super_arity = arity;
    }

    let kind = if owned.is_empty() {
        GroupKind::NonOwning {
            set: SparseSet::with_page_size(registry.config().sparse_page_size),
        }
    } else {
        GroupKind::Owning { len: 0 }
    };
    registry.groups.push(GroupData {
        signature: signature(&owned, &get, &exclude),
        owned,
        get,
        exclude,
        kind,
    });

    connect(registry, id);
    populate(registry, id);

    let group = &registry.groups[id];
    tracing::debug!(
        group = id,
        owned = group.owned.len(),
        get = group.get.len(),
        exclude = group.exclude.len(),
        members = len(registry, id),
        "group created"
    );
    id
}

fn connect(registry: &mut Registry, id: usize) {
    let group = &registry.groups[id];
    let required: Vec<usize> = group.owned.iter().chain(&group.get).copied().collect();
    let excluded = group.exclude.clone();

    for pool in required {
        let join: Listener = Arc::new(move |registry: &mut Registry, entity| {
            maybe_valid(registry, id, entity, None);
        });
        let leave: Listener = Arc::new(move |registry: &mut Registry, entity| {
            discard(registry, id, entity);
        });
        registry.pools[pool].signal_mut(Event::Construct).connect_internal(join);
        registry.pools[pool].signal_mut(Event::Destroy).connect_internal(leave);
    }

    for pool in excluded {
        let join: Listener = Arc::new(move |registry: &mut Registry, entity| {
            maybe_valid(registry, id, entity, Some(pool));
        });
        let leave: Listener = Arc::new(move |registry: &mut Registry, entity| {
            discard(registry, id, entity);
        });
        registry.pools[pool].signal_mut(Event::Destroy).connect_internal(join);
        registry.pools[pool].signal_mut(Event::Construct).connect_internal(leave);
    }
}

fn populate(registry: &mut Registry, id: usize) {
    let group = &registry.groups[id];
    match group.kind {
        GroupKind::Owning { .. } => {
            let lead = group.owned[0];
            let mut pos = 0;
            while pos < registry.pools[lead].len() {
                let entity = registry.pools[lead].set().entities()[pos];
                maybe_valid(registry, id, entity, None);
                pos += 1;
            }
        }
        GroupKind::NonOwning { .. } => {
            let candidates: Vec<Entity> = group
                .get
                .iter()
                .map(|&pool| registry.pools[pool].set())
                .min_by_key(|set| set.len())
                .map(|set| set.entities().to_vec())
                .unwrap_or_default();
            for entity in candidates {
                maybe_valid(registry, id, entity, None);
            }
        }
    }
}

/// Adds `entity` to the group if it now qualifies.
///
/// `ignore` names an excluded pool whose component is being destroyed and
/// is therefore still attached.
fn maybe_valid(registry: &mut Registry, id: usize, entity: Entity, ignore: Option<usize>) {
    let Registry { pools, groups, .. } = registry;
    let group = &mut groups[id];

    let qualifies = group
        .owned
        .iter()
        .chain(&group.get)
        .all(|&pool| pools[pool].contains(entity))
        && group
            .exclude
            .iter()
            .all(|&pool| Some(pool) == ignore || !pools[pool].contains(entity));
    if !qualifies {
        return;
    }

    match &mut group.kind {
        GroupKind::Owning { len } => {
            if pools[group.owned[0]].set().index(entity) < *len {
                return;
            }
            for &pool in &group.owned {
                let pos = pools[pool].set().index(entity);
                pools[pool].storage.swap_positions(pos, *len);
            }
            *len += 1;
        }
        GroupKind::NonOwning { set } => {
            if !set.contains(entity) {
                set.emplace(entity);
            }
        }
    }
}

/// Removes `entity` from the group if it is a member.
fn discard(registry: &mut Registry, id: usize, entity: Entity) {
    let Registry { pools, groups, .. } = registry;
    let group = &mut groups[id];

    match &mut group.kind {
        GroupKind::Owning { len } => {
            let Some(pos) = pools[group.owned[0]].set().try_index(entity) else {
                return;
            };
            if pos >= *len {
                return;
            }
            let last = *len - 1;
            for &pool in &group.owned {
                let pos = pools[pool].set().index(entity);
                pools[pool].storage.swap_positions(pos, last);
            }
            *len = last;
        }
        GroupKind::NonOwning { set } => {
            set.remove(entity);
        }
    }
}

fn len(registry: &Registry, id: usize) -> usize {
    match &registry.groups[id].kind {
        GroupKind::Owning { len } => *len,
        GroupKind::NonOwning { set } => set.len(),
    }
}

fn members(registry: &Registry, id: usize) -> &[Entity] {
    let group = &registry.groups[id];
    match &group.kind {
        GroupKind::Owning { len } => &registry.pools[group.owned[0]].set().entities()[..*len],
        GroupKind::NonOwning { set } => set.entities(),
    }
}

/// Reorders the members so that iteration follows `compare`.
///
/// `compare` receives the pools so it can look components up.
fn sort<F>(registry: &mut Registry, id: usize, mut compare: F, algo: SortAlgorithm)
where
    F: FnMut(&[Pool], Entity, Entity) -> Ordering,
{
    let mut order = members(registry, id).to_vec();
    {
        let pools: &[Pool] = &registry.pools;
        algo.sort(&mut order, |&lhs, &rhs| compare(pools, rhs, lhs));
    }

    let Registry { pools, groups, .. } = registry;
    let group = &mut groups[id];
    match &mut group.kind {
        GroupKind::Owning { .. } => {
            for &pool in &group.owned {
                for (pos, &entity) in order.iter().enumerate() {
                    let curr = pools[pool].set().index(entity);
                    if curr != pos {
                        pools[pool].storage.swap_positions(curr, pos);
                    }
                }
            }
        }
        GroupKind::NonOwning { set } => {
            let positions = order.iter().map(|&entity| set.index(entity)).collect();
            set.arrange(positions, |_, _| {});
        }
    }
}

/// Handle to a group owning `O`, observing `G` and excluding `X`.
///
/// Obtained from [`Registry::group`](crate::Registry::group). The handle
/// borrows the registry; the group itself lives as long as the registry
/// and keeps being maintained after the handle is dropped.
pub struct Group<'a, O, G, X> {
    registry: &'a mut Registry,
    id: usize,
    /// Pools of `O`, in declaration order.
    owned: Vec<usize>,
    /// Pools of `G`, in declaration order.
    get: Vec<usize>,
    _marker: PhantomData<fn() -> (O, G, X)>,
}

impl<'a, O, G, X> Group<'a, O, G, X>
where
    O: ComponentSet,
    G: ComponentSet,
    X: ComponentSet,
{
    pub(crate) fn new(registry: &'a mut Registry, id: usize, owned: Vec<usize>, get: Vec<usize>) -> Self {
        Self {
            registry,
            id,
            owned,
            get,
            _marker: PhantomData,
        }
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        len(self.registry, self.id)
    }

    /// Checks if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the group owns its component pools.
    #[must_use]
    pub fn is_owning(&self) -> bool {
        !self.owned.is_empty()
    }

    /// Checks if `entity` is a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        let group = &self.registry.groups[self.id];
        match &group.kind {
            GroupKind::Owning { len } => self.registry.pools[group.owned[0]]
                .set()
                .try_index(entity)
                .is_some_and(|pos| pos < *len),
            GroupKind::NonOwning { set } => set.contains(entity),
        }
    }

    /// Returns the members in packed order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        members(self.registry, self.id)
    }

    /// Iterates the members, last packed position first.
    pub fn iter(&self) -> SetIter<'_> {
        self.entities().iter().rev().copied()
    }

    /// Calls `func` with every member and mutable access to its owned and
    /// observed components.
    pub fn each<F>(&mut self, mut func: F)
    where
        F: FnMut(Entity, O::RefsMut<'_>, G::RefsMut<'_>),
    {
        let indices: Vec<usize> = self.owned.iter().chain(&self.get).copied().collect();
        let Registry { pools, groups, .. } = &mut *self.registry;

        let mut fetched = disjoint_mut(pools, &indices).into_iter();
        let mut owned = O::fetch_mut(&mut fetched);
        let mut get = G::fetch_mut(&mut fetched);

        match &groups[self.id].kind {
            GroupKind::Owning { len } => {
                let lead = O::part_sets(&owned)[0];
                for pos in (0..*len).rev() {
                    let entity = lead.entities()[pos];
                    func(entity, O::get_mut_at(&mut owned, pos), G::get_mut(&mut get, entity));
                }
            }
            GroupKind::NonOwning { set } => {
                for entity in set.iter() {
                    func(entity, O::get_mut(&mut owned, entity), G::get_mut(&mut get, entity));
                }
            }
        }
    }

    fn assert_member(&self, entity: Entity) {
        assert!(self.contains(entity), "{entity:?} is not a member of the group");
    }

    /// Returns a component of a member.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not a member.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.assert_member(entity);
        self.registry.get::<T>(entity)
    }

    /// Returns a component of a member mutably. No signal is published.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not a member.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.assert_member(entity);
        self.registry.get_mut::<T>(entity)
    }

    /// Checks if the group can be sorted.
    #[must_use]
    pub fn sortable(&self) -> bool {
        self.registry.sortable::<O, G, X>()
    }

    /// Sorts the members by `T` so that iteration follows `compare`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is neither owned nor observed by the group.
    pub fn sort_by<T, F>(&mut self, compare: F)
    where
        T: Component,
        F: FnMut(&T, &T) -> Ordering,
    {
        self.sort_with(compare, SortAlgorithm::Standard);
    }

    /// [`Group::sort_by`] with an explicit algorithm.
    ///
    /// # Panics
    ///
    /// Panics if `T` is neither owned nor observed by the group.
    pub fn sort_with<T, F>(&mut self, mut compare: F, algo: SortAlgorithm)
    where
        T: Component,
        F: FnMut(&T, &T) -> Ordering,
    {
        let target = self
            .registry
            .component_id::<T>()
            .map(|id| id.index())
            .filter(|pool| self.owned.contains(pool) || self.get.contains(pool));
        let Some(target) = target else {
            panic!("{} is not part of the group", type_name::<T>());
        };
        assert!(self.sortable(), "group is not sortable");

        sort(
            self.registry,
            self.id,
            |pools, lhs, rhs| {
                let storage = pools[target].typed::<T>();
                compare(storage.get(lhs), storage.get(rhs))
            },
            algo,
        );
    }

    /// Sorts the members so that iteration follows `compare` on entities.
    pub fn sort_by_entity<F>(&mut self, mut compare: F)
    where
        F: FnMut(Entity, Entity) -> Ordering,
    {
        assert!(self.sortable(), "group is not sortable");
        sort(
            self.registry,
            self.id,
            |_, lhs, rhs| compare(lhs, rhs),
            SortAlgorithm::Standard,
        );
    }
}

impl<'v, O, G, X> IntoIterator for &'v Group<'_, O, G, X>
where
    O: ComponentSet,
    G: ComponentSet,
    X: ComponentSet,
{
    type Item = Entity;
    type IntoIter = SetIter<'v>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Frozen;

    fn prefix<T: Component>(registry: &Registry, len: usize) -> Vec<Entity> {
        registry
            .storage::<T>()
            .map(|storage| storage.entities()[..len].to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_bootstrap_owning() {
        let mut registry = Registry::new();
        let entities = registry.create_many(5);
        for &entity in &entities[..3] {
            registry.emplace(entity, Position(0));
        }
        for &entity in &entities[1..4] {
            registry.emplace(entity, Velocity(0));
        }

        let group = registry.group::<(Position, Velocity), (), ()>();
        assert!(group.is_owning());
        assert_eq!(group.len(), 2);
        assert!(group.contains(entities[1]));
        assert!(group.contains(entities[2]));
        assert!(!group.contains(entities[0]));

        assert_eq!(prefix::<Position>(&registry, 2), prefix::<Velocity>(&registry, 2));
        assert!(registry.owned::<Position>());
    }

    #[test]
    fn test_incremental_maintenance() {
        let mut registry = Registry::new();
        let _ = registry.group::<(Position,), (Velocity,), (Frozen,)>();
        let entity = registry.create();

        registry.emplace(entity, Position(1));
        assert_eq!(registry.group::<(Position,), (Velocity,), (Frozen,)>().len(), 0);
        registry.emplace(entity, Velocity(1));
        assert_eq!(registry.group::<(Position,), (Velocity,), (Frozen,)>().len(), 1);
        registry.emplace(entity, Frozen);
        assert_eq!(registry.group::<(Position,), (Velocity,), (Frozen,)>().len(), 0);
        registry.remove::<Frozen>(entity);
        assert_eq!(registry.group::<(Position,), (Velocity,), (Frozen,)>().len(), 1);
        registry.remove::<Velocity>(entity);
        assert_eq!(registry.group::<(Position,), (Velocity,), (Frozen,)>().len(), 0);
    }

    #[test]
    fn test_memoized_by_signature() {
        let mut registry = Registry::new();
        let _ = registry.group::<(Position, Velocity), (), ()>();
        let _ = registry.group::<(Velocity, Position), (), ()>();
        assert_eq!(registry.groups.len(), 1);
        assert!(registry.group_if_exists::<(Position, Velocity), (), ()>().is_some());
        assert!(registry.group_if_exists::<(), (Position,), ()>().is_none());
    }

    #[test]
    #[should_panic(expected = "already owned")]
    fn test_conflicting_owner_panics() {
        let mut registry = Registry::new();
        let _ = registry.group::<(Position,), (), ()>();
        let _ = registry.group::<(Position, Velocity), (), ()>();
    }

    #[test]
    fn test_non_owning_members() {
        let mut registry = Registry::new();
        let entities = registry.create_many(3);
        for &entity in &entities {
            registry.emplace(entity, Position(0));
        }
        registry.emplace(entities[0], Velocity(0));

        let mut group = registry.group::<(), (Position, Velocity), ()>();
        assert!(!group.is_owning());
        assert_eq!(group.iter().collect::<Vec<_>>(), vec![entities[0]]);

        let mut visited = 0;
        group.each(|_, (), (pos, vel)| {
            pos.0 += 1;
            vel.0 += 1;
            visited += 1;
        });
        assert_eq!(visited, 1);
        assert!(!registry.owned::<Position>());
    }

    #[test]
    fn test_sort_owning_keeps_pools_aligned() {
        let mut registry = Registry::new();
        for value in [5, 3, 9, 1] {
            let entity = registry.create();
            registry.emplace(entity, Position(value));
            registry.emplace(entity, Velocity(-value));
        }

        let mut group = registry.group::<(Position, Velocity), (), ()>();
        group.sort_by::<Position, _>(|l, r| l.0.cmp(&r.0));

        let mut seen = Vec::new();
        group.each(|_, (pos, vel), ()| {
            assert_eq!(pos.0, -vel.0);
            seen.push(pos.0);
        });
        assert_eq!(seen, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_sort_non_owning_by_entity() {
        let mut registry = Registry::new();
        let entities = registry.create_many(4);
        for &entity in &entities {
            registry.emplace(entity, Position(0));
        }

        let mut group = registry.group::<(), (Position,), ()>();
        group.sort_by_entity(|l, r| l.index().cmp(&r.index()));
        assert_eq!(group.iter().collect::<Vec<_>>(), entities);
    }
}
