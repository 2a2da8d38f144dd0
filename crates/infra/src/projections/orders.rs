use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_core::{Money, UserId};
use storefront_events::EventEnvelope;
use storefront_shop::{AppliedDiscount, OrderEvent, OrderId, OrderLine, OrderStatus, Payment, PaymentStatus, ShippingChoice};

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub shipping_method: Option<ShippingChoice>,
    pub shipping_cost: Money,
    pub discount: Option<AppliedDiscount>,
    pub total: Money,
    pub shipping_address: String,
    pub notes: String,
    pub payments: Vec<Payment>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct OrdersProjection<S = InMemoryReadStore<OrderId, OrderView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<OrderView> {
        self.store.get(id)
    }

    /// Newest first.
    pub fn list(&self) -> Vec<OrderView> {
        let mut out = self.store.list();
        out.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(b.order_id.cmp(&a.order_id)));
        out
    }

    /// Newest first, narrowed to one user and/or one status.
    pub fn search(&self, user_id: Option<UserId>, status: Option<OrderStatus>) -> Vec<OrderView> {
        self.list()
            .into_iter()
            .filter(|o| user_id.is_none_or(|u| o.user_id == u))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect()
    }
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderView>,
{
    fn update(&self, id: OrderId, at: DateTime<Utc>, f: impl FnOnce(&mut OrderView)) {
        if let Some(mut view) = self.store.get(&id) {
            f(&mut view);
            view.updated_at = at;
            self.store.upsert(id, view);
        }
    }
}

impl<S> Projection for OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::ORDER
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::ORDER {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: OrderEvent = decode(streams::ORDER, envelope)?;
        let order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::OrderStatusChanged(e) => e.order_id,
            OrderEvent::PaymentRecorded(e) => e.order_id,
            OrderEvent::PaymentStatusChanged(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    order_id,
                    OrderView {
                        order_id,
                        order_number: e.order_number,
                        user_id: e.user_id,
                        status: OrderStatus::Pending,
                        lines: e.lines,
                        subtotal: e.subtotal,
                        shipping_method: e.shipping_method,
                        shipping_cost: e.shipping_cost,
                        discount: e.discount,
                        total: e.total,
                        shipping_address: e.shipping_address,
                        notes: e.notes,
                        payments: Vec::new(),
                        placed_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.update(order_id, e.occurred_at, |view| view.status = e.to);
            }
            OrderEvent::PaymentRecorded(e) => {
                self.update(order_id, e.occurred_at, |view| {
                    view.payments.push(Payment {
                        payment_id: e.payment_id,
                        amount: e.amount,
                        method: e.method,
                        status: PaymentStatus::Pending,
                        transaction_id: e.transaction_id,
                        payment_date: None,
                        created_at: e.occurred_at,
                    })
                });
            }
            OrderEvent::PaymentStatusChanged(e) => {
                self.update(order_id, e.occurred_at, |view| {
                    if let Some(p) = view.payments.iter_mut().find(|p| p.payment_id == e.payment_id) {
                        p.status = e.to;
                        if e.to == PaymentStatus::Completed {
                            p.payment_date = Some(e.occurred_at);
                        }
                    }
                });
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    fn cursors(&self) -> &StreamCursors {
        &self.cursors
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
    use crate::projections::rebuild;
    use rust_decimal::Decimal;
    use storefront_catalog::ProductId;
    use storefront_core::{Aggregate, ExpectedVersion};
    use storefront_events::execute;
    use storefront_shop::{ChangeOrderStatus, Order, OrderCommand, PaymentId, PaymentMethod, PlaceOrder, RecordPayment};
    use uuid::Uuid;

    fn place(store: &InMemoryEventStore, user_id: UserId) -> OrderId {
        let order_id = OrderId::generate();
        let mut order = Order::empty(order_id);
        let mut events = execute(
            &mut order,
            &OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                user_id,
                lines: vec![OrderLine::new(ProductId::for_slug("mug"), "Mug", 2, Decimal::new(500, 2))],
                shipping_method: None,
                shipping_cost: Decimal::new(300, 2),
                discount: None,
                shipping_address: "1 Quay Street".to_string(),
                notes: String::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        events.extend(
            execute(
                &mut order,
                &OrderCommand::ChangeStatus(ChangeOrderStatus {
                    order_id,
                    status: OrderStatus::Processing,
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap(),
        );

        let batch = events
            .iter()
            .map(|e| UncommittedEvent::from_typed(order_id.0, streams::ORDER, Uuid::now_v7(), e).unwrap())
            .collect();
        store.append(batch, ExpectedVersion::Exact(0)).unwrap();
        order_id
    }

    #[test]
    fn rebuild_replays_orders_per_user() {
        let store = InMemoryEventStore::new();
        let (alice, bob) = (UserId::new(), UserId::new());
        let first = place(&store, alice);
        place(&store, bob);
        place(&store, alice);

        let projection = OrdersProjection::<InMemoryReadStore<_, _>>::default();
        assert_eq!(rebuild(&projection, &store).unwrap(), 6);

        let mine = projection.search(Some(alice), None);
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|o| o.user_id == alice));

        let view = projection.get(&first).unwrap();
        assert_eq!(view.status, OrderStatus::Processing);
        assert_eq!(view.subtotal, Decimal::new(1000, 2));
        assert_eq!(view.total, Decimal::new(1300, 2));

        // Replaying again starts from a clean slate.
        assert_eq!(rebuild(&projection, &store).unwrap(), 6);
        assert_eq!(projection.list().len(), 3);
    }

    #[test]
    fn search_narrows_by_user_and_status() {
        let store = InMemoryEventStore::new();
        let alice = UserId::new();
        place(&store, alice);
        place(&store, UserId::new());

        let projection = OrdersProjection::<InMemoryReadStore<_, _>>::default();
        rebuild(&projection, &store).unwrap();

        assert_eq!(projection.search(None, Some(OrderStatus::Processing)).len(), 2);
        assert_eq!(projection.search(Some(alice), Some(OrderStatus::Processing)).len(), 1);
        assert!(projection.search(Some(alice), Some(OrderStatus::Pending)).is_empty());
        assert_eq!(projection.search(None, None).len(), 2);
    }

    #[test]
    fn payments_show_up_on_the_view() {
        let store = InMemoryEventStore::new();
        let id = place(&store, UserId::new());
        let mut order = Order::empty(id);
        for stored in store.load_stream(id.0).unwrap() {
            order.apply(&serde_json::from_value(stored.payload).unwrap());
        }
        let events = execute(
            &mut order,
            &OrderCommand::RecordPayment(RecordPayment {
                order_id: id,
                payment_id: PaymentId::generate(),
                amount: Decimal::new(1300, 2),
                method: PaymentMethod::Cash,
                transaction_id: String::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let batch = events
            .iter()
            .map(|e| UncommittedEvent::from_typed(id.0, streams::ORDER, Uuid::now_v7(), e).unwrap())
            .collect();
        store.append(batch, ExpectedVersion::Exact(2)).unwrap();

        let projection = OrdersProjection::<InMemoryReadStore<_, _>>::default();
        rebuild(&projection, &store).unwrap();
        let view = projection.get(&id).unwrap();
        assert_eq!(view.payments.len(), 1);
        assert_eq!(view.payments[0].status, PaymentStatus::Pending);
        assert_eq!(view.payments[0].method, PaymentMethod::Cash);
    }

    #[test]
    fn gaps_are_reported() {
        let projection = OrdersProjection::<InMemoryReadStore<_, _>>::default();
        let store = InMemoryEventStore::new();
        let id = place(&store, UserId::new());
        let events = store.load_stream(id.0).unwrap();

        projection.apply_envelope(&events[0].to_envelope()).unwrap();
        projection.apply_envelope(&events[1].to_envelope()).unwrap();
        let mut skipped = events[1].clone();
        skipped.sequence_number = 5;
        assert!(matches!(
            projection.apply_envelope(&skipped.to_envelope()),
            Err(ProjectionError::NonMonotonicSequence { last: 2, found: 5 })
        ));
    }

    #[test]
    fn catch_up_heals_out_of_order_delivery() {
        let projection = OrdersProjection::<InMemoryReadStore<_, _>>::default();
        let store = InMemoryEventStore::new();
        let id = place(&store, UserId::new());
        let late = store.load_stream(id.0).unwrap()[1].to_envelope();

        assert!(projection.apply_envelope(&late).is_err());
        assert_eq!(crate::projections::catch_up(&projection, &store, id.0).unwrap(), 2);
        projection.apply_envelope(&late).unwrap();
        assert_eq!(projection.get(&id).unwrap().status, OrderStatus::Processing);
    }
}
