//! # Memory Management
//!
//! Backing memory for sparse sets.
//!
//! ## Design Philosophy
//!
//! Entity indices are sparse, positions are dense:
//! - Sparse side is paged and allocated on first touch
//! - Dense side is a plain contiguous `Vec`

mod paged;

pub use paged::{PagedIndex, ABSENT};
