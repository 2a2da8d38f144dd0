use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_events::EventEnvelope;
use storefront_shop::{DiscountCodeEvent, DiscountCodeId, DiscountRules};

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Admin listing of discount codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountCodeView {
    pub code_id: DiscountCodeId,
    pub code: String,
    pub rules: DiscountRules,
    pub is_active: bool,
    pub times_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DiscountCodesProjection<S = InMemoryReadStore<DiscountCodeId, DiscountCodeView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> DiscountCodesProjection<S>
where
    S: ReadStore<DiscountCodeId, DiscountCodeView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &DiscountCodeId) -> Option<DiscountCodeView> {
        self.store.get(id)
    }

    /// Ordered by code.
    pub fn list(&self) -> Vec<DiscountCodeView> {
        let mut out = self.store.list();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        out
    }

    fn update(&self, id: DiscountCodeId, at: DateTime<Utc>, f: impl FnOnce(&mut DiscountCodeView)) {
        if let Some(mut view) = self.store.get(&id) {
            f(&mut view);
            view.updated_at = at;
            self.store.upsert(id, view);
        }
    }
}

fn code_id_of(ev: &DiscountCodeEvent) -> DiscountCodeId {
    match ev {
        DiscountCodeEvent::Created(e) => e.code_id,
        DiscountCodeEvent::RulesUpdated(e) => e.code_id,
        DiscountCodeEvent::Activated(e) => e.code_id,
        DiscountCodeEvent::Deactivated(e) => e.code_id,
        DiscountCodeEvent::Redeemed(e) => e.code_id,
    }
}

impl<S> Projection for DiscountCodesProjection<S>
where
    S: ReadStore<DiscountCodeId, DiscountCodeView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::DISCOUNT_CODE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::DISCOUNT_CODE {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: DiscountCodeEvent = decode(streams::DISCOUNT_CODE, envelope)?;
        let id = code_id_of(&ev);
        if id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            DiscountCodeEvent::Created(e) => {
                self.store.upsert(
                    id,
                    DiscountCodeView {
                        code_id: id,
                        code: e.code,
                        rules: e.rules,
                        is_active: e.is_active,
                        times_used: 0,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            DiscountCodeEvent::RulesUpdated(e) => self.update(id, e.occurred_at, |v| v.rules = e.rules),
            DiscountCodeEvent::Activated(e) => self.update(id, e.occurred_at, |v| v.is_active = true),
            DiscountCodeEvent::Deactivated(e) => self.update(id, e.occurred_at, |v| v.is_active = false),
            DiscountCodeEvent::Redeemed(e) => self.update(id, e.occurred_at, |v| v.times_used += 1),
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
    use chrono::Duration;
    use rust_decimal::Decimal;
    use storefront_core::UserId;
    use storefront_events::execute;
    use storefront_shop::{
        CreateDiscountCode, DeactivateDiscountCode, DiscountCode, DiscountCodeCommand, DiscountType,
        OrderId, RecordRedemption,
    };
    use uuid::Uuid;

    struct Feed {
        code: DiscountCode,
        seq: u64,
    }

    impl Feed {
        fn run(&mut self, cmd: DiscountCodeCommand) -> Vec<EventEnvelope<JsonValue>> {
            let events = execute(&mut self.code, &cmd).unwrap();
            events
                .iter()
                .map(|e| {
                    self.seq += 1;
                    EventEnvelope::new(
                        Uuid::now_v7(),
                        self.code.id_typed().0,
                        streams::DISCOUNT_CODE,
                        self.seq,
                        serde_json::to_value(e).unwrap(),
                    )
                })
                .collect()
        }
    }

    fn rules() -> DiscountRules {
        serde_json::from_value(serde_json::json!({
            "discount_type": "percentage",
            "discount_value": "10",
            "expires_at": (Utc::now() + Duration::days(1)).to_rfc3339(),
        }))
        .unwrap()
    }

    #[test]
    fn tracks_activity_and_usage() {
        let id = DiscountCodeId::for_code("WELCOME");
        let mut feed = Feed {
            code: DiscountCode::empty(id),
            seq: 0,
        };
        let projection = DiscountCodesProjection::<InMemoryReadStore<_, _>>::default();

        let mut envs = feed.run(DiscountCodeCommand::Create(CreateDiscountCode {
            code_id: id,
            code: "WELCOME".to_string(),
            rules: rules(),
            is_active: true,
            occurred_at: Utc::now(),
        }));
        envs.extend(feed.run(DiscountCodeCommand::RecordRedemption(RecordRedemption {
            code_id: id,
            user_id: UserId::new(),
            order_id: OrderId::generate(),
            email: None,
            occurred_at: Utc::now(),
        })));
        envs.extend(feed.run(DiscountCodeCommand::Deactivate(DeactivateDiscountCode {
            code_id: id,
            occurred_at: Utc::now(),
        })));
        for env in &envs {
            projection.apply_envelope(env).unwrap();
        }

        let view = projection.get(&id).unwrap();
        assert_eq!(view.code, "WELCOME");
        assert_eq!(view.times_used, 1);
        assert!(!view.is_active);
        assert_eq!(view.rules.discount_type, DiscountType::Percentage);
        assert_eq!(view.rules.discount_value, Decimal::new(10, 0));
    }
}
