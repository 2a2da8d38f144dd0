use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_core::Money;
use storefront_events::EventEnvelope;
use storefront_shop::{ShippingMethodEvent, ShippingMethodId};

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingMethodView {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ShippingMethodsProjection<S = InMemoryReadStore<ShippingMethodId, ShippingMethodView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ShippingMethodsProjection<S>
where
    S: ReadStore<ShippingMethodId, ShippingMethodView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &ShippingMethodId) -> Option<ShippingMethodView> {
        self.store.get(id)
    }

    /// Cheapest first, then by name.
    pub fn list(&self) -> Vec<ShippingMethodView> {
        let mut out = self.store.list();
        out.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        out
    }

    pub fn list_active(&self) -> Vec<ShippingMethodView> {
        self.list().into_iter().filter(|m| m.is_active).collect()
    }

    fn update(&self, id: ShippingMethodId, at: DateTime<Utc>, f: impl FnOnce(&mut ShippingMethodView)) {
        if let Some(mut view) = self.store.get(&id) {
            f(&mut view);
            view.updated_at = at;
            self.store.upsert(id, view);
        }
    }
}

impl<S> Projection for ShippingMethodsProjection<S>
where
    S: ReadStore<ShippingMethodId, ShippingMethodView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::SHIPPING_METHOD
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::SHIPPING_METHOD {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ShippingMethodEvent = decode(streams::SHIPPING_METHOD, envelope)?;
        let id = ev.method_id();
        if id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            ShippingMethodEvent::Created(e) => self.store.upsert(
                id,
                ShippingMethodView {
                    method_id: id,
                    name: e.name,
                    description: e.description,
                    price: e.price,
                    is_active: e.is_active,
                    updated_at: e.occurred_at,
                },
            ),
            ShippingMethodEvent::Updated(e) => self.update(id, e.occurred_at, |v| {
                v.name = e.name;
                v.description = e.description;
                v.price = e.price;
            }),
            ShippingMethodEvent::ActivityChanged(e) => self.update(id, e.occurred_at, |v| v.is_active = e.is_active),
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
    use rust_decimal::Decimal;
    use storefront_events::execute;
    use storefront_shop::{CreateShippingMethod, SetShippingMethodActive, ShippingMethod, ShippingMethodCommand};
    use uuid::Uuid;

    fn envelopes(method: &mut ShippingMethod, seq: &mut u64, cmd: ShippingMethodCommand) -> Vec<EventEnvelope<JsonValue>> {
        execute(method, &cmd)
            .unwrap()
            .iter()
            .map(|e| {
                *seq += 1;
                EventEnvelope::new(
                    Uuid::now_v7(),
                    method.id_typed().0,
                    streams::SHIPPING_METHOD,
                    *seq,
                    serde_json::to_value(e).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn inactive_methods_drop_out_of_the_public_list() {
        let projection = ShippingMethodsProjection::<InMemoryReadStore<_, _>>::default();
        let mut all = Vec::new();
        for (name, cents) in [("Express", 1500), ("Standard", 495)] {
            let id = ShippingMethodId::generate();
            let mut method = ShippingMethod::empty(id);
            let mut seq = 0;
            all.push(id);
            for env in envelopes(
                &mut method,
                &mut seq,
                ShippingMethodCommand::Create(CreateShippingMethod {
                    method_id: id,
                    name: name.to_string(),
                    description: String::new(),
                    price: Decimal::new(cents, 2),
                    is_active: true,
                    occurred_at: Utc::now(),
                }),
            ) {
                projection.apply_envelope(&env).unwrap();
            }
            if name == "Express" {
                for env in envelopes(
                    &mut method,
                    &mut seq,
                    ShippingMethodCommand::SetActive(SetShippingMethodActive {
                        method_id: id,
                        is_active: false,
                        occurred_at: Utc::now(),
                    }),
                ) {
                    projection.apply_envelope(&env).unwrap();
                }
            }
        }

        let names: Vec<_> = projection.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Standard", "Express"]);
        let active = projection.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].method_id, all[1]);
    }
}
