//! Append-only event store boundary.
//!
//! Streams are keyed by aggregate id. Only an in-memory backend is provided.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
