//! # Entity Snapshots
//!
//! Raw export of a registry's entity slots and free list. Components are
//! not included; serializers walk pools separately and reattach them after
//! [`Registry::restore`](crate::Registry::restore).
//!
//! ## Byte Layout
//!
//! ```text
//! [ destroyed: u32 LE | slot 0: u32 LE | slot 1: u32 LE | ... ]
//! ```

use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

const WORD: usize = std::mem::size_of::<u32>();

/// Entity slot array and free-list head of a registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySnapshot {
    entities: Vec<Entity>,
    destroyed: Entity,
}

impl EntitySnapshot {
    pub(crate) fn new(entities: Vec<Entity>, destroyed: Entity) -> Self {
        Self { entities, destroyed }
    }

    /// Returns the slot array. Free slots hold free-list links.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns the head of the free list.
    #[must_use]
    pub fn destroyed(&self) -> Entity {
        self.destroyed
    }

    /// Returns the slot array as raw words.
    #[must_use]
    pub fn as_words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.entities)
    }

    /// Encodes the snapshot as little-endian words, free-list head first.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.entities.len() + 1) * WORD);
        bytes.extend_from_slice(&self.destroyed.to_bits().to_le_bytes());
        for &word in self.as_words() {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Decodes bytes produced by [`EntitySnapshot::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MalformedSnapshot`] if the length is not a
    /// non-zero multiple of four, or if the decoded slots are inconsistent.
    pub fn from_bytes(bytes: &[u8]) -> EcsResult<Self> {
        if bytes.is_empty() || bytes.len() % WORD != 0 {
            return Err(EcsError::MalformedSnapshot(format!(
                "length {} is not a non-zero multiple of {WORD}",
                bytes.len()
            )));
        }

        let mut words = bytes
            .chunks_exact(WORD)
            .map(|chunk| Entity::from_bits(u32::from_le(bytemuck::pod_read_unaligned(chunk))));
        let destroyed = words.next().unwrap_or(Entity::NULL);
        let snapshot = Self::new(words.collect(), destroyed);
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Checks that the free list is well formed.
    ///
    /// Every slot must either hold its own index (alive) or be reachable
    /// exactly once from the free-list head.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MalformedSnapshot`] describing the first problem.
    pub fn validate(&self) -> EcsResult<()> {
        let len = self.entities.len();
        if len >= Entity::INDEX_MASK as usize {
            return Err(EcsError::MalformedSnapshot(format!("{len} slots exceed the index space")));
        }

        let mut visited = vec![false; len];
        let mut curr = self.destroyed;
        while !curr.is_null() {
            let slot = curr.slot();
            if slot >= len {
                return Err(EcsError::MalformedSnapshot(format!(
                    "free-list link {slot} is out of range"
                )));
            }
            if visited[slot] {
                return Err(EcsError::MalformedSnapshot(format!("free list loops at slot {slot}")));
            }
            if self.entities[slot].slot() == slot {
                return Err(EcsError::MalformedSnapshot(format!(
                    "free list reaches alive slot {slot}"
                )));
            }
            visited[slot] = true;
            curr = self.entities[slot];
        }

        for (slot, entity) in self.entities.iter().enumerate() {
            if entity.slot() != slot && !visited[slot] {
                return Err(EcsError::MalformedSnapshot(format!(
                    "free slot {slot} is not on the free list"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Entity>, Entity) {
        (self.entities, self.destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EntitySnapshot {
        // slot 1 free (recycles with version 2), slots 0 and 2 alive
        EntitySnapshot::new(
            vec![Entity::new(0, 0), Entity::new(Entity::INDEX_MASK, 2), Entity::new(2, 1)],
            Entity::new(1, 0),
        )
    }

    #[test]
    fn test_bytes_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &1u32.to_le_bytes());
        assert_eq!(EntitySnapshot::from_bytes(&bytes), Ok(sample()));
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            EntitySnapshot::from_bytes(&bytes[..7]),
            Err(EcsError::MalformedSnapshot(_))
        ));
        assert!(EntitySnapshot::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_rejects_unlinked_free_slot() {
        let snapshot = EntitySnapshot::new(sample().entities, Entity::NULL);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_rejects_cycle() {
        let snapshot = EntitySnapshot::new(
            vec![Entity::new(1, 0), Entity::new(0, 0)],
            Entity::new(0, 0),
        );
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_as_words() {
        assert_eq!(sample().as_words()[2], Entity::new(2, 1).to_bits());
    }
}
