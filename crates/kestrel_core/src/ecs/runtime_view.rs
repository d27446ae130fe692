//! Type-erased view built from component ids known only at runtime.
//!
//! Intended for inspectors and scripting bridges. Only entities are
//! yielded; components are fetched through the registry.

use super::entity::Entity;
use super::sparse_set::SparseSet;
use super::view::{Filter, ViewIter};

/// View over entities that are in every included pool and in no excluded
/// pool. Created by [`Registry::runtime_view`](crate::Registry::runtime_view).
pub struct RuntimeView<'a> {
    filter: Filter<'a>,
}

impl<'a> RuntimeView<'a> {
    pub(crate) fn new(mut include: Vec<&'a SparseSet>, exclude: Vec<&'a SparseSet>) -> Self {
        if let Some(smallest) = include
            .iter()
            .enumerate()
            .min_by_key(|(_, set)| set.len())
            .map(|(pos, _)| pos)
        {
            include.swap(0, smallest);
        }
        Self {
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

    /// Calls `func` with every entity of the view.
    pub fn each<F>(&self, func: F)
    where
        F: FnMut(Entity),
    {
        self.iter().for_each(func);
    }
}

impl<'v> IntoIterator for &'v RuntimeView<'_> {
    type Item = Entity;
    type IntoIter = ViewIter<'v>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ComponentId, Registry};

    #[test]
    fn test_intersection_by_id() {
        let mut registry = Registry::new();
        let entities = registry.create_many(4);
        for &entity in &entities {
            registry.emplace(entity, 0u8);
        }
        registry.emplace(entities[1], 0u16);
        registry.emplace(entities[2], 0u16);
        registry.emplace(entities[2], 0u32);

        let ids = [registry.register::<u8>(), registry.register::<u16>()];
        let exclude = [registry.register::<u32>()];
        let view = registry.runtime_view(&ids, &exclude);
        assert_eq!(view.size_hint(), 2);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![entities[1]]);
        assert!(!view.contains(entities[2]));
    }

    #[test]
    fn test_unknown_or_empty_include() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.emplace(entity, 1u8);

        let view = registry.runtime_view(&[ComponentId::new(9)], &[]);
        assert_eq!(view.iter().count(), 0);

        let view = registry.runtime_view(&[], &[]);
        assert!(!view.contains(entity));
        let mut visited = 0;
        view.each(|_| visited += 1);
        assert_eq!(visited, 0);
    }
}
