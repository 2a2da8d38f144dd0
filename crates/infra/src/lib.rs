//! Infrastructure layer: event store, command pipeline, projections,
//! background workers and the checkout workflow.

pub mod checkout;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod streams;
pub mod workers;
