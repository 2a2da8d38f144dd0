//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply history)
//!   ↓
//! 3. Handle command (pure decision, produces events)
//!   ↓
//! 4. Append to store with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! Two writers racing on the same stream cannot both commit: the loser gets
//! `DispatchError::Concurrency` and may be re-decided against the new state
//! with [`CommandDispatcher::dispatch_with_retry`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use storefront_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stream moved between load and append.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Business-level conflict (duplicate key, exhausted code); retrying will not help.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Stored payload no longer matches the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (events are persisted).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine, generic over store and bus.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate from its stream (an empty stream yields `make_aggregate(id)`).
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command through the full pipeline; returns the committed events.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        self.run(aggregate_id, aggregate_type, &command, make_aggregate)
            .map(|(_, committed)| committed)
    }

    /// Like [`dispatch`](Self::dispatch), but returns the aggregate state after the command.
    pub fn execute<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        self.run(aggregate_id, aggregate_type, &command, make_aggregate)
            .map(|(aggregate, _)| aggregate)
    }

    /// Re-run load/decide/append when the append loses an optimistic race.
    ///
    /// Only `DispatchError::Concurrency` is retried; the command is decided
    /// again against the fresh state each time.
    pub fn dispatch_with_retry<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
        max_attempts: usize,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.run(aggregate_id, aggregate_type, &command, &make_aggregate) {
                Ok((aggregate, _)) => return Ok(aggregate),
                Err(DispatchError::Concurrency(msg)) if attempt < max_attempts => {
                    tracing::debug!(%aggregate_id, aggregate_type, attempt, reason = %msg, "retrying after concurrency conflict");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn run<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, Vec<StoredEvent>), DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        // 3) Decide (no mutation)
        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok((aggregate, vec![]));
        }

        // 4) Persist
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;
        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok((aggregate, committed))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use storefront_catalog::{
        AdjustStock, CreateProduct, Pricing, Product, ProductCommand, ProductId, ProductType,
    };
    use storefront_core::{AggregateRoot, Money};
    use storefront_events::InMemoryBusError;
    use storefront_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;
    use crate::streams;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Bus> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn create(slug: &str) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            product_id: ProductId::for_slug(slug),
            title: "Mug".to_string(),
            slug: slug.to_string(),
            summary: String::new(),
            category: None,
            pricing: Pricing::regular(Money::new(1200, 2)),
            stock: 5,
            product_type: ProductType::Physical,
            occurred_at: Utc::now(),
        })
    }

    fn adjust(slug: &str, delta: i64) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            product_id: ProductId::for_slug(slug),
            delta,
            occurred_at: Utc::now(),
        })
    }

    fn make(id: AggregateId) -> Product {
        Product::empty(ProductId::new(id))
    }

    #[test]
    fn dispatch_persists_then_publishes() {
        let d = dispatcher();
        let (store, bus) = (d.store().clone(), d.bus.clone());
        let sub = bus.subscribe();
        let id = ProductId::for_slug("mug").0;

        let committed = d.dispatch(id, streams::PRODUCT, create("mug"), make).unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(store.load_stream(id).unwrap().len(), 1);
        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_type(), streams::PRODUCT);
        assert_eq!(env.sequence_number(), 1);
    }

    #[test]
    fn load_rehydrates_state() {
        let d = dispatcher();
        let id = ProductId::for_slug("mug").0;
        d.dispatch(id, streams::PRODUCT, create("mug"), make).unwrap();
        d.dispatch(id, streams::PRODUCT, adjust("mug", -2), make).unwrap();

        let product = d.load(id, make).unwrap();
        assert_eq!(product.stock(), 3);
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn domain_errors_map_onto_dispatch_errors() {
        let d = dispatcher();
        let id = ProductId::for_slug("mug").0;

        assert!(matches!(
            d.dispatch(id, streams::PRODUCT, adjust("mug", 1), make),
            Err(DispatchError::NotFound)
        ));
        d.dispatch(id, streams::PRODUCT, create("mug"), make).unwrap();
        assert!(matches!(
            d.dispatch(id, streams::PRODUCT, create("mug"), make),
            Err(DispatchError::Conflict(_))
        ));
        assert!(matches!(
            d.dispatch(id, streams::PRODUCT, adjust("mug", -50), make),
            Err(DispatchError::InvariantViolation(_))
        ));
    }

    /// Store that lets one competing writer sneak in before the first append.
    struct RacingStore {
        inner: Arc<InMemoryEventStore>,
        raced: AtomicBool,
        competitor: UncommittedEvent,
    }

    impl EventStore for RacingStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.append(vec![self.competitor.clone()], ExpectedVersion::Any)?;
            }
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }

        fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_by_type(aggregate_type)
        }
    }

    /// A "mug" product with stock 5, and a competitor that will take 4 units.
    fn racing_dispatcher() -> CommandDispatcher<RacingStore, Bus> {
        let inner = Arc::new(InMemoryEventStore::new());
        let seed = CommandDispatcher::new(inner.clone(), Arc::new(InMemoryEventBus::new()));
        let id = ProductId::for_slug("mug").0;
        seed.dispatch(id, streams::PRODUCT, create("mug"), make).unwrap();

        let current = seed.load(id, make).unwrap();
        let decided = current.handle(&adjust("mug", -4)).unwrap();
        let competitor = UncommittedEvent::from_typed(id, streams::PRODUCT, Uuid::now_v7(), &decided[0]).unwrap();

        CommandDispatcher::new(
            RacingStore {
                inner,
                raced: AtomicBool::new(false),
                competitor,
            },
            Arc::new(InMemoryEventBus::new()),
        )
    }

    #[test]
    fn losing_writer_gets_concurrency_error() {
        let d = racing_dispatcher();
        let id = ProductId::for_slug("mug").0;

        let err = d.dispatch(id, streams::PRODUCT, adjust("mug", -3), make).unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn retry_redecides_against_fresh_state() {
        let d = racing_dispatcher();
        let id = ProductId::for_slug("mug").0;

        // Competitor took 4 of 5; taking 3 more must now fail on the invariant.
        let err = d
            .dispatch_with_retry(id, streams::PRODUCT, adjust("mug", -3), make, 3)
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));

        let product = d.dispatch_with_retry(id, streams::PRODUCT, adjust("mug", -1), make, 3).unwrap();
        assert_eq!(product.stock(), 0);
    }

    #[test]
    fn publish_failure_is_reported_after_append() {
        struct ClosedBus;
        impl EventBus<EventEnvelope<JsonValue>> for ClosedBus {
            type Error = InMemoryBusError;
            fn publish(&self, _message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
                Err(InMemoryBusError::Poisoned)
            }
            fn subscribe(&self) -> storefront_events::Subscription<EventEnvelope<JsonValue>> {
                let (_tx, rx) = std::sync::mpsc::channel();
                storefront_events::Subscription::new(rx)
            }
        }

        let store = Arc::new(InMemoryEventStore::new());
        let d = CommandDispatcher::new(store.clone(), ClosedBus);
        let id = ProductId::for_slug("mug").0;

        let err = d.dispatch(id, streams::PRODUCT, create("mug"), make).unwrap_err();
        assert!(matches!(err, DispatchError::Publish(_)));
        assert_eq!(store.load_stream(id).unwrap().len(), 1);
    }
}
