//! # Paged Index
//!
//! Sparse mapping from entity index to packed position.
//!
//! Pages are allocated lazily, so a set holding only entity 900,000 costs
//! one page rather than 900,000 slots.

use crate::ecs::Entity;

/// Marker stored in slots that map to nothing.
///
/// The null index can never be a packed position because packed arrays are
/// bounded by the entity index range.
pub const ABSENT: u32 = Entity::INDEX_MASK;

/// Lazily allocated, fixed-size pages of `u32` slots.
#[derive(Clone, Debug)]
pub struct PagedIndex {
    /// Pages, `None` until first written.
    pages: Vec<Option<Box<[u32]>>>,
    /// Slots per page. Always a power of two.
    page_size: usize,
    /// `log2(page_size)`.
    shift: u32,
}

impl PagedIndex {
    /// Creates an empty index.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Slots per page
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");

        Self {
            pages: Vec::new(),
            page_size,
            shift: page_size.trailing_zeros(),
        }
    }

    /// Returns the number of slots per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages actually allocated.
    #[must_use]
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }

    /// Returns the number of addressable slots (pages times page size).
    #[inline]
    #[must_use]
    pub fn extent(&self) -> usize {
        self.pages.len() * self.page_size
    }

    #[inline]
    const fn locate(&self, index: usize) -> (usize, usize) {
        (index >> self.shift, index & (self.page_size - 1))
    }

    /// Looks up the value stored for `index`.
    ///
    /// # Returns
    ///
    /// The stored position, or `None` if the slot is absent or its page was
    /// never allocated.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<usize> {
        let (page, offset) = self.locate(index);
        match self.pages.get(page) {
            Some(Some(slots)) if slots[offset] != ABSENT => Some(slots[offset] as usize),
            _ => None,
        }
    }

    /// Stores `value` for `index`, allocating its page if needed.
    #[inline]
    pub fn insert(&mut self, index: usize, value: usize) {
        debug_assert!(value < ABSENT as usize, "position out of range");

        let (page, offset) = self.locate(index);
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let page_size = self.page_size;
        let slots = self.pages[page].get_or_insert_with(|| vec![ABSENT; page_size].into_boxed_slice());
        slots[offset] = value as u32;
    }

    /// Marks `index` as absent. Pages are kept for reuse.
    ///
    /// # Returns
    ///
    /// The value that was stored, if any.
    #[inline]
    pub fn remove(&mut self, index: usize) -> Option<usize> {
        let (page, offset) = self.locate(index);
        let slots = self.pages.get_mut(page)?.as_mut()?;
        let previous = std::mem::replace(&mut slots[offset], ABSENT);
        (previous != ABSENT).then_some(previous as usize)
    }

    /// Releases every page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
