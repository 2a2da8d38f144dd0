use std::io;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use storefront_events::{EventBus, EventEnvelope, Subscription};

use crate::event_store::EventStore;
use crate::projections::{Projection, ProjectionError, catch_up};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic bus consumer loop on a dedicated thread.
///
/// The handler must be idempotent: delivery is at-least-once.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Subscribes before returning, so every message published after this
    /// call reaches the handler.
    pub fn spawn<M, B, H, E>(name: &'static str, bus: B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M>,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(name: &'static str, sub: Subscription<M>, shutdown_rx: mpsc::Receiver<()>, handler: &mut H)
where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "projection worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Fan an envelope out to every projection. A sequence gap is healed from
/// the store instead of being surfaced.
pub fn projection_handler<S>(
    store: S,
    projections: Vec<Arc<dyn Projection>>,
) -> impl FnMut(EventEnvelope<JsonValue>) -> Result<(), ProjectionError> + Send + 'static
where
    S: EventStore + 'static,
{
    move |envelope| {
        for projection in projections
            .iter()
            .filter(|p| p.aggregate_type() == envelope.aggregate_type())
        {
            match projection.apply_envelope(&envelope) {
                Err(ProjectionError::NonMonotonicSequence { last, found }) => {
                    debug!(
                        aggregate_type = envelope.aggregate_type(),
                        aggregate_id = %envelope.aggregate_id(),
                        last,
                        found,
                        "sequence gap, catching up from store"
                    );
                    catch_up(projection.as_ref(), &store, envelope.aggregate_id())?;
                }
                other => other?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use storefront_events::InMemoryEventBus;

    use crate::projections::OrdersProjection;
    use crate::event_store::InMemoryEventStore;
    use crate::read_model::InMemoryReadStore;

    #[test]
    fn handler_runs_until_shutdown() {
        let bus: Arc<InMemoryEventBus<u32>> = Arc::new(InMemoryEventBus::new());
        let (seen_tx, seen_rx) = mpsc::channel();
        let worker = ProjectionWorker::spawn("test-worker", bus.clone(), move |n: u32| {
            seen_tx.send(n).map_err(|_| "closed")
        })
        .unwrap();

        bus.publish(7).unwrap();
        assert_eq!(seen_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);

        let started = Instant::now();
        worker.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn handler_skips_unrelated_projections() {
        let store = Arc::new(InMemoryEventStore::new());
        let orders: Arc<OrdersProjection<InMemoryReadStore<_, _>>> = Arc::default();
        let mut handle = projection_handler(store, vec![orders.clone() as Arc<dyn Projection>]);

        let env = EventEnvelope::new(
            uuid::Uuid::now_v7(),
            storefront_core::AggregateId::new(),
            crate::streams::CART,
            1,
            serde_json::json!({"not": "an order"}),
        );
        handle(env).unwrap();
        assert!(orders.list().is_empty());
    }
}
