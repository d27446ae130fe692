//! # Components
//!
//! Any `Send + Sync + 'static` type is a component. Tuples of components
//! form a [`ComponentSet`], the type-level list used by views and groups.

use std::any::TypeId;

use super::entity::Entity;
use super::pool::Pool;
use super::registry::Registry;
use super::sparse_set::SparseSet;
use super::storage::Storage;

/// Marker for types that can be attached to entities.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Registry-local identifier of a component type.
///
/// Ids are handed out in first-use order and are only meaningful for the
/// registry that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the position of the pool inside its registry.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Description of a component pool, as reported by
/// [`Registry::visit`](crate::Registry::visit).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Registry-local id.
    pub id: ComponentId,
    /// Rust type id.
    pub type_id: TypeId,
    /// Rust type name.
    pub name: &'static str,
    /// Size of one component in bytes.
    pub size: usize,
    /// Number of components currently stored.
    pub len: usize,
}

/// A tuple of component types, used to parameterize queries.
///
/// Implemented for `()` and tuples of up to eight components.
pub trait ComponentSet: 'static {
    /// Number of component types in the set.
    const COUNT: usize;

    /// Shared borrows of every storage.
    type Storages<'a>: Copy
    where
        Self: 'a;
    /// Each storage split into its entity set and mutable component slice.
    type Parts<'a>
    where
        Self: 'a;
    /// Shared references to one entity's components.
    type Refs<'a>
    where
        Self: 'a;
    /// Mutable references to one entity's components.
    type RefsMut<'a>
    where
        Self: 'a;

    /// Type ids in declaration order.
    fn type_ids() -> Vec<TypeId>;

    /// Pool indices in declaration order, creating missing pools.
    #[doc(hidden)]
    fn register(registry: &mut Registry) -> Vec<usize>;

    #[doc(hidden)]
    fn fetch<'a, I>(pools: &mut I) -> Self::Storages<'a>
    where
        I: Iterator<Item = &'a Pool>;

    #[doc(hidden)]
    fn fetch_mut<'a, I>(pools: &mut I) -> Self::Parts<'a>
    where
        I: Iterator<Item = &'a mut Pool>;

    #[doc(hidden)]
    fn sets(storages: Self::Storages<'_>) -> Vec<&SparseSet>;

    #[doc(hidden)]
    fn part_sets<'a>(parts: &Self::Parts<'a>) -> Vec<&'a SparseSet>;

    #[doc(hidden)]
    fn get(storages: Self::Storages<'_>, entity: Entity) -> Self::Refs<'_>;

    #[doc(hidden)]
    fn get_mut<'b>(parts: &'b mut Self::Parts<'_>, entity: Entity) -> Self::RefsMut<'b>;

    #[doc(hidden)]
    fn get_mut_at<'b>(parts: &'b mut Self::Parts<'_>, pos: usize) -> Self::RefsMut<'b>;
}

fn next_pool<T, I: Iterator<Item = T>>(pools: &mut I) -> T {
    match pools.next() {
        Some(pool) => pool,
        None => unreachable!("fewer pools than component types"),
    }
}

macro_rules! count {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count!($($tail)*) };
}

macro_rules! impl_component_set {
    ($($name:ident . $idx:tt),*) => {
        #[allow(unused_variables, clippy::unused_unit)]
        impl<$($name: Component),*> ComponentSet for ($($name,)*) {
            const COUNT: usize = count!($($name)*);

            type Storages<'a> = ($(&'a Storage<$name>,)*) where Self: 'a;
            type Parts<'a> = ($((&'a SparseSet, &'a mut [$name]),)*) where Self: 'a;
            type Refs<'a> = ($(&'a $name,)*) where Self: 'a;
            type RefsMut<'a> = ($(&'a mut $name,)*) where Self: 'a;

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),*]
            }

            fn register(registry: &mut Registry) -> Vec<usize> {
                vec![$(registry.assure::<$name>()),*]
            }

            fn fetch<'a, I>(pools: &mut I) -> Self::Storages<'a>
            where
                I: Iterator<Item = &'a Pool>,
            {
                ($(next_pool(pools).typed::<$name>(),)*)
            }

            fn fetch_mut<'a, I>(pools: &mut I) -> Self::Parts<'a>
            where
                I: Iterator<Item = &'a mut Pool>,
            {
                ($(next_pool(pools).split_mut::<$name>(),)*)
            }

            fn sets(storages: Self::Storages<'_>) -> Vec<&SparseSet> {
                vec![$(storages.$idx.set()),*]
            }

            fn part_sets<'a>(parts: &Self::Parts<'a>) -> Vec<&'a SparseSet> {
                vec![$(parts.$idx.0),*]
            }

            fn get(storages: Self::Storages<'_>, entity: Entity) -> Self::Refs<'_> {
                ($(storages.$idx.get(entity),)*)
            }

            fn get_mut<'b>(parts: &'b mut Self::Parts<'_>, entity: Entity) -> Self::RefsMut<'b> {
                ($(&mut parts.$idx.1[parts.$idx.0.index(entity)],)*)
            }

            fn get_mut_at<'b>(parts: &'b mut Self::Parts<'_>, pos: usize) -> Self::RefsMut<'b> {
                ($(&mut parts.$idx.1[pos],)*)
            }
        }
    };
}

impl_component_set!();
impl_component_set!(A.0);
impl_component_set!(A.0, B.1);
impl_component_set!(A.0, B.1, C.2);
impl_component_set!(A.0, B.1, C.2, D.3);
impl_component_set!(A.0, B.1, C.2, D.3, E.4);
impl_component_set!(A.0, B.1, C.2, D.3, E.4, F.5);
impl_component_set!(A.0, B.1, C.2, D.3, E.4, F.5, G.6);
impl_component_set!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
