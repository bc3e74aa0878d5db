//! Periodic background sync
//!
//! A single recurring timer drives batch pushes of the whole collection.
//! The timer only decides *when*; whether a tick does any work is decided by
//! the store (see `TaskStore::flush`).
//!
//! ## Usage
//!
//! ```ignore
//! store.start_autosave(Duration::from_secs(5));
//! ```

mod scheduler;

pub use scheduler::SyncScheduler;
