//! Registry-wide singletons keyed by type.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::component::Component;

/// Type-keyed store of context variables.
#[derive(Default)]
pub(crate) struct Context {
    vars: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub(crate) fn set<T: Component>(&mut self, value: T) -> &mut T {
        let slot = match self.vars.entry(TypeId::of::<T>()) {
            Entry::Occupied(mut entry) => {
                entry.insert(Box::new(value));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(Box::new(value)),
        };
        downcast_mut(slot)
    }

    pub(crate) fn get<T: Component>(&self) -> Option<&T> {
        self.vars.get(&TypeId::of::<T>())?.downcast_ref()
    }

    pub(crate) fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.vars.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    pub(crate) fn get_or_insert_with<T, F>(&mut self, make: F) -> &mut T
    where
        T: Component,
        F: FnOnce() -> T,
    {
        let slot = self
            .vars
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(make()) as Box<dyn Any + Send + Sync>);
        downcast_mut(slot)
    }

    pub(crate) fn remove<T: Component>(&mut self) -> Option<T> {
        let boxed = self.vars.remove(&TypeId::of::<T>())?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    pub(crate) fn contains<T: Component>(&self) -> bool {
        self.vars.contains_key(&TypeId::of::<T>())
    }
}

fn downcast_mut<T: Component>(slot: &mut Box<dyn Any + Send + Sync>) -> &mut T {
    match slot.downcast_mut::<T>() {
        Some(value) => value,
        None => unreachable!("context variable stored under the wrong type id"),
    }
}
