//! # Shared Registry
//!
//! A [`Registry`] behind a reader-writer lock, for handing one registry to
//! several threads.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────────┐
//!                │        SharedRegistry        │
//!                │  ┌────────────────────────┐  │
//!                │  │   RwLock<Registry>     │  │
//!                │  └────────────────────────┘  │
//!                │  ┌────────────────────────┐  │
//!                │  │   revision (AtomicU64) │  │
//!                │  └────────────────────────┘  │
//!                └──────────────┬───────────────┘
//!                   ┌───────────┴───────────┐
//!                   ▼                       ▼
//!          ┌─────────────────┐     ┌─────────────────┐
//!          │   WriteHandle   │     │   ReadHandle    │
//!          │ (one at a time) │     │ (many at once)  │
//!          └─────────────────┘     └─────────────────┘
//! ```
//!
//! Every released write handle bumps the revision, so readers can tell
//! cheaply whether anything may have changed since they last looked.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ecs::Registry;

struct Shared {
    registry: RwLock<Registry>,
    revision: AtomicU64,
}

/// Cloneable, thread-safe handle to a registry.
///
/// ## Usage
///
/// ```rust
/// use kestrel_core::{Registry, SharedRegistry};
///
/// let shared = SharedRegistry::new(Registry::new());
///
/// let entity = {
///     let mut write = shared.write();
///     let entity = write.create();
///     write.emplace(entity, 42u32);
///     entity
/// };
///
/// let read = shared.read();
/// assert_eq!(*read.get::<u32>(entity), 42);
/// assert_eq!(shared.revision(), 1);
/// ```
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<Shared>,
}

impl SharedRegistry {
    /// Wraps `registry` for shared access.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(Shared {
                registry: RwLock::new(registry),
                revision: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the number of write handles released so far.
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    /// Acquires shared access, blocking while a writer holds the lock.
    #[must_use]
    pub fn read(&self) -> RegistryReadHandle<'_> {
        RegistryReadHandle {
            guard: self.inner.registry.read(),
        }
    }

    /// Acquires shared access if no writer holds the lock.
    #[must_use]
    pub fn try_read(&self) -> Option<RegistryReadHandle<'_>> {
        self.inner
            .registry
            .try_read()
            .map(|guard| RegistryReadHandle { guard })
    }

    /// Acquires exclusive access, blocking until every other handle is gone.
    #[must_use]
    pub fn write(&self) -> RegistryWriteHandle<'_> {
        RegistryWriteHandle {
            guard: self.inner.registry.write(),
            revision: &self.inner.revision,
        }
    }

    /// Acquires exclusive access if no other handle is held.
    #[must_use]
    pub fn try_write(&self) -> Option<RegistryWriteHandle<'_>> {
        self.inner
            .registry
            .try_write()
            .map(|guard| RegistryWriteHandle {
                guard,
                revision: &self.inner.revision,
            })
    }

    /// Returns the registry if this is the last handle to it.
    ///
    /// # Errors
    ///
    /// Gives `self` back if other clones are still alive.
    pub fn into_inner(self) -> Result<Registry, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(shared) => Ok(shared.registry.into_inner()),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl std::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

/// Shared access to a [`SharedRegistry`].
pub struct RegistryReadHandle<'a> {
    guard: RwLockReadGuard<'a, Registry>,
}

impl Deref for RegistryReadHandle<'_> {
    type Target = Registry;

    #[inline]
    fn deref(&self) -> &Registry {
        &self.guard
    }
}

/// Exclusive access to a [`SharedRegistry`]. Bumps the revision on drop.
pub struct RegistryWriteHandle<'a> {
    guard: RwLockWriteGuard<'a, Registry>,
    revision: &'a AtomicU64,
}

impl Deref for RegistryWriteHandle<'_> {
    type Target = Registry;

    #[inline]
    fn deref(&self) -> &Registry {
        &self.guard
    }
}

impl DerefMut for RegistryWriteHandle<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Registry {
        &mut self.guard
    }
}

impl Drop for RegistryWriteHandle<'_> {
    fn drop(&mut self) {
        self.revision.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_write_bumps_revision() {
        let shared = SharedRegistry::new(Registry::new());
        assert_eq!(shared.revision(), 0);
        drop(shared.write());
        let _read = shared.read();
        assert_eq!(shared.revision(), 1);
    }

    #[test]
    fn test_try_write_fails_while_reading() {
        let shared = SharedRegistry::new(Registry::new());
        let read = shared.read();
        assert!(shared.try_write().is_none());
        assert!(shared.try_read().is_some());
        drop(read);
        assert!(shared.try_write().is_some());
    }

    #[test]
    fn test_threads_share_registry() {
        let shared = SharedRegistry::new(Registry::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let mut write = shared.write();
                        let entity = write.create();
                        write.emplace(entity, 1u64);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let registry = shared.into_inner().unwrap();
        assert_eq!(registry.alive(), 100);
        assert_eq!(registry.len_of::<u64>(), 100);
    }

    #[test]
    fn test_into_inner_with_clones() {
        let shared = SharedRegistry::new(Registry::new());
        let other = shared.clone();
        let shared = shared.into_inner().unwrap_err();
        drop(other);
        assert!(shared.into_inner().is_ok());
    }
}
