//! # Entity Identifiers
//!
//! Entities are 32-bit handles consisting of:
//! - Lower 20 bits: index of the slot in the registry
//! - Upper 12 bits: version, bumped every time the slot is recycled
//!
//! The all-ones index is reserved for [`Entity::NULL`].

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Opaque entity handle.
///
/// Equality compares index and version together, so a stale handle to a
/// recycled slot never compares equal to the handle now living there.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Number of bits used by the index field.
    pub const INDEX_BITS: u32 = 20;

    /// Number of bits used by the version field.
    pub const VERSION_BITS: u32 = 12;

    /// Mask of the index field. Also the reserved null index.
    pub const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;

    /// Mask of the version field (after shifting it down).
    pub const VERSION_MASK: u32 = (1 << Self::VERSION_BITS) - 1;

    /// The null entity: all-ones index, version zero.
    pub const NULL: Self = Self(Self::INDEX_MASK);

    /// Creates an entity from an index and a version.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot index, truncated to 20 bits
    /// * `version` - Generation counter, truncated to 12 bits
    #[inline]
    #[must_use]
    pub const fn new(index: u32, version: u32) -> Self {
        Self((index & Self::INDEX_MASK) | ((version & Self::VERSION_MASK) << Self::INDEX_BITS))
    }

    /// Returns the index field.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    /// Returns the version field.
    #[inline]
    #[must_use]
    pub const fn version(self) -> u32 {
        self.0 >> Self::INDEX_BITS
    }

    /// Returns the version a recycled slot will carry, wrapping at 2^12.
    #[inline]
    #[must_use]
    pub const fn next_version(self) -> u32 {
        (self.version() + 1) & Self::VERSION_MASK
    }

    /// Returns the raw packed value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds an entity from a raw packed value.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Checks if the index field holds the reserved null value.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index() == Self::INDEX_MASK
    }

    /// Index as a `usize`, for addressing slots and sparse pages.
    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.index() as usize
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.version())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_fields() {
        let entity = Entity::new(12345, 678);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.version(), 678);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
    }

    #[test]
    fn test_version_wraps() {
        let entity = Entity::new(3, Entity::VERSION_MASK);
        assert_eq!(entity.next_version(), 0);
        assert_eq!(Entity::new(3, 7).next_version(), 8);
    }

    #[test]
    fn test_null() {
        assert!(Entity::NULL.is_null());
        assert_eq!(Entity::NULL.version(), 0);
        assert!(Entity::new(Entity::INDEX_MASK, 5).is_null());
        assert!(!Entity::new(0, 0).is_null());
        assert_eq!(Entity::default(), Entity::NULL);
    }

    #[test]
    fn test_versions_distinguish_handles() {
        let old = Entity::new(9, 0);
        let new = Entity::new(9, 1);
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
    }

    #[test]
    fn test_pod_cast() {
        let entities = [Entity::new(1, 2), Entity::NULL];
        let words: &[u32] = bytemuck::cast_slice(&entities);
        assert_eq!(words, &[(2 << 20) | 1, Entity::INDEX_MASK]);
    }
}
