//! Projections: rebuildable read models fed from committed events.
//!
//! Every projection tracks a per-stream cursor, so at-least-once delivery
//! from the bus is safe: duplicates are skipped and gaps are reported, to be
//! healed with [`catch_up`].

pub mod catalog;
pub mod cursor;
pub mod discounts;
pub mod orders;
pub mod reviews;
pub mod shipping;

use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_core::AggregateId;
use storefront_events::EventEnvelope;

use crate::event_store::{EventStore, EventStoreError};

pub use catalog::{CategoriesProjection, CategoryView, ProductView, ProductsProjection};
pub use cursor::StreamCursors;
pub use discounts::{DiscountCodeView, DiscountCodesProjection};
pub use orders::{OrderView, OrdersProjection};
pub use reviews::{ReviewOrdering, ReviewQuery, ReviewView, ReviewsProjection};
pub use shipping::{ShippingMethodView, ShippingMethodsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: &'static str,
        message: String,
    },

    #[error("event does not belong to stream {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// A read model builder for one aggregate type.
pub trait Projection: Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    /// Apply one envelope. Envelopes of other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    fn cursors(&self) -> &StreamCursors;

    /// Forget all state, cursors included.
    fn reset(&self);
}

/// Clear `projection` and replay its aggregate type from the store.
pub fn rebuild<P, S>(projection: &P, store: &S) -> Result<usize, ProjectionError>
where
    P: Projection + ?Sized,
    S: EventStore + ?Sized,
{
    let events = store.load_by_type(projection.aggregate_type())?;
    projection.reset();
    for stored in &events {
        projection.apply_envelope(&stored.to_envelope())?;
    }
    Ok(events.len())
}

/// Apply whatever the store holds for one stream beyond what `projection`
/// has seen. Used to heal a gap left by out-of-order delivery.
pub fn catch_up<P, S>(projection: &P, store: &S, aggregate_id: AggregateId) -> Result<usize, ProjectionError>
where
    P: Projection + ?Sized,
    S: EventStore + ?Sized,
{
    let events = store.load_stream(aggregate_id)?;
    let mut applied = 0;
    for stored in events.iter().filter(|e| e.aggregate_type == projection.aggregate_type()) {
        let before = projection.cursors().last(aggregate_id);
        projection.apply_envelope(&stored.to_envelope())?;
        if projection.cursors().last(aggregate_id) != before {
            applied += 1;
        }
    }
    Ok(applied)
}

pub(crate) fn decode<E: serde::de::DeserializeOwned>(
    aggregate_type: &'static str,
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type,
        message: e.to_string(),
    })
}
