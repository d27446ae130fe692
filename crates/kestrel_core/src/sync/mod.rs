//! # Synchronization
//!
//! The registry itself is single-threaded: signal listeners take
//! `&mut Registry`, so every mutation happens on one thread at a time.
//! It is, however, `Send + Sync`, which makes external synchronization
//! enough to share it:
//!
//! ```text
//! Thread 1 (logic):   write handle   -> create / emplace / destroy
//! Thread 2 (render):  read handle    -> view / get
//! Thread 3 (tools):   read handle    -> runtime_view / visit
//! ```
//!
//! Readers run in parallel; a writer waits for all of them.

mod shared;

pub use shared::{RegistryReadHandle, RegistryWriteHandle, SharedRegistry};
