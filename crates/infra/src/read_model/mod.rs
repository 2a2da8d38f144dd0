//! Read model storage for disposable, rebuildable views.

pub mod store;

pub use store::{InMemoryReadStore, ReadStore};
