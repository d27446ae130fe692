//! # KESTREL Core
//!
//! Sparse-set Entity Component System (ECS) built for:
//! - Stable, recyclable entity handles with version counters
//! - Dense per-component pools with O(1) attach, detach and lookup
//! - Multi-component queries: views, runtime views and groups
//! - Lifecycle signals that keep groups consistent under mutation
//!
//! ## Architecture Rules
//!
//! 1. **Safe code only** - Disjoint pool borrows instead of raw pointers
//! 2. **Data-oriented design** - Components are stored in contiguous arrays
//! 3. **Misuse is a bug** - Invalid entities and conflicting groups panic;
//!    only configuration and snapshot input return errors
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::Registry;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut registry = Registry::new();
//! for i in 0..10 {
//!     let entity = registry.create();
//!     registry.emplace(entity, Position(0.0));
//!     if i % 2 == 0 {
//!         registry.emplace(entity, Velocity(1.0));
//!     }
//! }
//!
//! let mut group = registry.group::<(Position, Velocity), (), ()>();
//! assert_eq!(group.len(), 5);
//! group.each(|_, (pos, vel), ()| pos.0 += vel.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod sync;

pub use config::RegistryConfig;
pub use ecs::{
    Component, ComponentId, ComponentInfo, ComponentSet, Connection, Entity, EntitySnapshot,
    Group, RuntimeView, Registry, Sink, SortAlgorithm, SparseSet, Storage, View, ViewMut,
};
pub use error::{EcsError, EcsResult};
pub use sync::{RegistryReadHandle, RegistryWriteHandle, SharedRegistry};
