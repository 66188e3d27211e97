//! In-memory cluster state store.
//!
//! The store holds every cluster object in persistent (structurally shared)
//! maps. Taking a [`StateSnapshot`] clones the map roots, which is O(1), and
//! the resulting view never observes later writes. Garbage collection passes
//! make all of their decisions against one snapshot instead of locking the
//! live store for the length of the pass.
//!
//! ## Modules
//!
//! - `store`: the mutable store, written by the log apply path
//! - `snapshot`: read-only views and the [`SnapshotSource`] seam

mod error;
mod snapshot;
mod store;

pub use error::StateError;
pub use snapshot::{ObjectRef, SnapshotSource, StateSnapshot};
pub use store::StateStore;
