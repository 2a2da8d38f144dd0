//! Infrastructure wiring: event store, bus, dispatcher, projections and the
//! background worker that feeds them.

use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storefront_core::{Aggregate, AggregateId, DomainError, Money};
use storefront_events::{Event, EventEnvelope, InMemoryEventBus};
use storefront_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::InMemoryEventStore,
    projections::{
        CategoriesProjection, DiscountCodesProjection, OrdersProjection, Projection, ProductsProjection,
        ReviewsProjection, ShippingMethodsProjection,
    },
    workers::{ProjectionWorker, WorkerHandle, projection_handler},
};

pub type EventBusHandle = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, EventBusHandle>;

/// Attempts for commands that may race with concurrent writers on the same
/// stream (carts, discount codes).
pub const RETRY_ATTEMPTS: usize = 5;

pub struct AppServices {
    dispatcher: Dispatcher,
    categories: Arc<CategoriesProjection>,
    products: Arc<ProductsProjection>,
    discounts: Arc<DiscountCodesProjection>,
    orders: Arc<OrdersProjection>,
    reviews: Arc<ReviewsProjection>,
    shipping_methods: Arc<ShippingMethodsProjection>,
    flat_shipping: Money,
    worker: Mutex<Option<WorkerHandle>>,
}

pub fn build_services(flat_shipping: Money) -> io::Result<AppServices> {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: EventBusHandle = Arc::new(InMemoryEventBus::new());

    let categories = Arc::new(CategoriesProjection::default());
    let products = Arc::new(ProductsProjection::default());
    let discounts = Arc::new(DiscountCodesProjection::default());
    let orders = Arc::new(OrdersProjection::default());
    let reviews = Arc::new(ReviewsProjection::default());
    let shipping_methods = Arc::new(ShippingMethodsProjection::default());

    // Background subscriber: bus -> projections
    let projections = vec![
        categories.clone() as Arc<dyn Projection>,
        products.clone() as Arc<dyn Projection>,
        discounts.clone() as Arc<dyn Projection>,
        orders.clone() as Arc<dyn Projection>,
        reviews.clone() as Arc<dyn Projection>,
        shipping_methods.clone() as Arc<dyn Projection>,
    ];
    let worker = ProjectionWorker::spawn("storefront.projections", bus.clone(), projection_handler(store.clone(), projections))?;

    Ok(AppServices {
        dispatcher: CommandDispatcher::new(store, bus),
        categories,
        products,
        discounts,
        orders,
        reviews,
        shipping_methods,
        flat_shipping,
        worker: Mutex::new(Some(worker)),
    })
}

impl AppServices {
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn categories(&self) -> &CategoriesProjection {
        &self.categories
    }

    pub fn products(&self) -> &ProductsProjection {
        &self.products
    }

    pub fn discounts(&self) -> &DiscountCodesProjection {
        &self.discounts
    }

    pub fn orders(&self) -> &OrdersProjection {
        &self.orders
    }

    pub fn reviews(&self) -> &ReviewsProjection {
        &self.reviews
    }

    pub fn shipping_methods(&self) -> &ShippingMethodsProjection {
        &self.shipping_methods
    }

    pub fn flat_shipping(&self) -> Money {
        self.flat_shipping
    }

    pub fn load<A>(&self, aggregate_id: AggregateId, make_aggregate: impl FnOnce(AggregateId) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.dispatcher.load(aggregate_id, make_aggregate)
    }

    /// Run a command and return the aggregate state it produced.
    pub fn execute<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch_with_retry(aggregate_id, aggregate_type, command, make_aggregate, RETRY_ATTEMPTS)
            .inspect_err(|e| tracing::warn!(%aggregate_id, aggregate_type, error = %e, "command rejected"))
    }

    /// Stop the projection worker. Idempotent.
    pub fn shutdown(&self) {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            handle.shutdown();
            tracing::info!("projection worker stopped");
        }
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}
