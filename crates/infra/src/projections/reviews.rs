use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_catalog::{ProductId, ReviewEvent, ReviewId};
use storefront_core::UserId;
use storefront_events::EventEnvelope;

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub author: UserId,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReviewOrdering {
    #[default]
    Newest,
    Oldest,
    HighestRated,
    LowestRated,
}

impl ReviewOrdering {
    /// `created_at`, `-created_at`, `rating`, `-rating`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "-created_at" => Some(Self::Newest),
            "created_at" => Some(Self::Oldest),
            "-rating" => Some(Self::HighestRated),
            "rating" => Some(Self::LowestRated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewQuery {
    pub product: Option<ProductId>,
    pub rating: Option<u8>,
    pub include_unapproved: bool,
    pub ordering: ReviewOrdering,
}

#[derive(Debug, Default)]
pub struct ReviewsProjection<S = InMemoryReadStore<ReviewId, ReviewView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ReviewsProjection<S>
where
    S: ReadStore<ReviewId, ReviewView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &ReviewId) -> Option<ReviewView> {
        self.store.get(id)
    }

    pub fn search(&self, query: &ReviewQuery) -> Vec<ReviewView> {
        let mut out: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|r| query.include_unapproved || r.is_approved)
            .filter(|r| query.product.is_none_or(|p| r.product_id == p))
            .filter(|r| query.rating.is_none_or(|n| r.rating == n))
            .collect();
        match query.ordering {
            ReviewOrdering::Newest => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ReviewOrdering::Oldest => out.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            ReviewOrdering::HighestRated => {
                out.sort_by(|a, b| b.rating.cmp(&a.rating).then(b.created_at.cmp(&a.created_at)))
            }
            ReviewOrdering::LowestRated => {
                out.sort_by(|a, b| a.rating.cmp(&b.rating).then(b.created_at.cmp(&a.created_at)))
            }
        }
        out
    }

    fn update(&self, id: ReviewId, at: DateTime<Utc>, f: impl FnOnce(&mut ReviewView)) {
        if let Some(mut view) = self.store.get(&id) {
            f(&mut view);
            view.updated_at = at;
            self.store.upsert(id, view);
        }
    }
}

impl<S> Projection for ReviewsProjection<S>
where
    S: ReadStore<ReviewId, ReviewView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::REVIEW
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::REVIEW {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ReviewEvent = decode(streams::REVIEW, envelope)?;
        let id = ev.review_id();
        if id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            ReviewEvent::Submitted(e) => self.store.upsert(
                id,
                ReviewView {
                    review_id: id,
                    product_id: e.product_id,
                    author: e.author,
                    rating: e.rating,
                    title: e.title,
                    content: e.content,
                    is_approved: false,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            ReviewEvent::Edited(e) => self.update(id, e.occurred_at, |v| {
                v.rating = e.rating;
                v.title = e.title;
                v.content = e.content;
                v.is_approved = false;
            }),
            ReviewEvent::Moderated(e) => self.update(id, e.occurred_at, |v| v.is_approved = e.approved),
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
    use storefront_catalog::{ModerateReview, Review, ReviewCommand, SubmitReview};
    use storefront_events::execute;
    use uuid::Uuid;

    fn feed(projection: &ReviewsProjection, product_id: ProductId, rating: u8, approve: bool, at: DateTime<Utc>) {
        let author = UserId::new();
        let id = ReviewId::for_author(product_id, author);
        let mut review = Review::empty(id);
        let mut events = execute(
            &mut review,
            &ReviewCommand::Submit(SubmitReview {
                review_id: id,
                product_id,
                author,
                rating,
                title: format!("{rating} stars"),
                content: "ok".to_string(),
                occurred_at: at,
            }),
        )
        .unwrap();
        if approve {
            events.extend(
                execute(
                    &mut review,
                    &ReviewCommand::Moderate(ModerateReview {
                        review_id: id,
                        approved: true,
                        occurred_at: at,
                    }),
                )
                .unwrap(),
            );
        }
        for (i, e) in events.iter().enumerate() {
            let env = EventEnvelope::new(Uuid::now_v7(), id.0, streams::REVIEW, i as u64 + 1, serde_json::to_value(e).unwrap());
            projection.apply_envelope(&env).unwrap();
        }
    }

    #[test]
    fn public_listing_shows_approved_reviews_filtered_and_ordered() {
        let projection = ReviewsProjection::default();
        let mug = ProductId::for_slug("mug");
        let tee = ProductId::for_slug("tee");
        let t0 = Utc::now();
        feed(&projection, mug, 3, true, t0);
        feed(&projection, mug, 5, true, t0 + Duration::minutes(1));
        feed(&projection, mug, 1, false, t0 + Duration::minutes(2));
        feed(&projection, tee, 5, true, t0 + Duration::minutes(3));

        let mugs = projection.search(&ReviewQuery {
            product: Some(mug),
            ..ReviewQuery::default()
        });
        assert_eq!(mugs.iter().map(|r| r.rating).collect::<Vec<_>>(), vec![5, 3]);

        let fives = projection.search(&ReviewQuery {
            rating: Some(5),
            ordering: ReviewOrdering::Oldest,
            ..ReviewQuery::default()
        });
        assert_eq!(fives.iter().map(|r| r.product_id).collect::<Vec<_>>(), vec![mug, tee]);

        let lowest = projection.search(&ReviewQuery {
            include_unapproved: true,
            ordering: ReviewOrdering::LowestRated,
            ..ReviewQuery::default()
        });
        assert_eq!(lowest.len(), 4);
        assert_eq!(lowest[0].rating, 1);
        assert!(!lowest[0].is_approved);
    }

    #[test]
    fn ordering_accepts_the_four_sort_keys() {
        assert_eq!(ReviewOrdering::parse("-rating"), Some(ReviewOrdering::HighestRated));
        assert_eq!(ReviewOrdering::parse("created_at"), Some(ReviewOrdering::Oldest));
        assert_eq!(ReviewOrdering::parse("title"), None);
    }
}
