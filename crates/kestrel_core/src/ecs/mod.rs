//! # Entity Component System
//!
//! A sparse-set ECS: one dense pool per component type, indexed by entity.
//!
//! ## Design Philosophy
//!
//! - Components live in packed arrays, one per type, for cache-friendly walks
//! - Entity IDs are slot indices with version counters, recycled through a
//!   free list threaded through the slot array
//! - Queries intersect pools on the fly (views) or keep the intersection
//!   packed at the front of the pools (owning groups)
//! - Pools publish construct/update/destroy signals; groups listen to them

mod algorithm;
mod component;
mod context;
mod entity;
mod group;
mod pool;
mod registry;
mod runtime_view;
mod signal;
mod snapshot;
mod sparse_set;
mod storage;
mod view;

pub use algorithm::{insertion_sort, radix_sort, SortAlgorithm};
pub use component::{Component, ComponentId, ComponentInfo, ComponentSet};
pub use entity::Entity;
pub use group::Group;
pub use pool::Pool;
pub use registry::Registry;
pub use runtime_view::RuntimeView;
pub use signal::{Connection, Listener, Signal, Sink};
pub use snapshot::EntitySnapshot;
pub use sparse_set::{SetIter, SparseSet};
pub use storage::{Storage, StorageIter, StorageIterMut};
pub use view::{View, ViewIter, ViewMut};
