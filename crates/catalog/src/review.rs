//! Product reviews. One per (product, user); hidden until a moderator approves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::product::ProductId;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Derived from (product, user), so a second review by the same user
/// lands on the existing stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub AggregateId);

impl ReviewId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_author(product_id: ProductId, user_id: UserId) -> Self {
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(product_id.0.as_uuid().as_bytes());
        key.extend_from_slice(user_id.as_uuid().as_bytes());
        Self(AggregateId::derived("catalog.review", &key))
    }
}

impl core::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    id: ReviewId,
    product_id: Option<ProductId>,
    author: Option<UserId>,
    rating: u8,
    title: String,
    content: String,
    is_approved: bool,
    version: u64,
    created: bool,
}

impl Review {
    pub fn empty(id: ReviewId) -> Self {
        Self {
            id,
            product_id: None,
            author: None,
            rating: 0,
            title: String::new(),
            content: String::new(),
            is_approved: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReviewId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn author(&self) -> Option<UserId> {
        self.author
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_approved(&self) -> bool {
        self.is_approved
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// The caller checks that the product exists and is on sale before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReview {
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub author: UserId,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

/// Author edit. Sends the review back to moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditReview {
    pub review_id: ReviewId,
    pub author: UserId,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerateReview {
    pub review_id: ReviewId,
    pub approved: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewCommand {
    Submit(SubmitReview),
    Edit(EditReview),
    Moderate(ModerateReview),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSubmitted {
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub author: UserId,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEdited {
    pub review_id: ReviewId,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewModerated {
    pub review_id: ReviewId,
    pub approved: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewEvent {
    Submitted(ReviewSubmitted),
    Edited(ReviewEdited),
    Moderated(ReviewModerated),
}

impl ReviewEvent {
    pub fn review_id(&self) -> ReviewId {
        match self {
            ReviewEvent::Submitted(e) => e.review_id,
            ReviewEvent::Edited(e) => e.review_id,
            ReviewEvent::Moderated(e) => e.review_id,
        }
    }
}

impl Event for ReviewEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::Submitted(_) => "catalog.review.submitted",
            ReviewEvent::Edited(_) => "catalog.review.edited",
            ReviewEvent::Moderated(_) => "catalog.review.moderated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReviewEvent::Submitted(e) => e.occurred_at,
            ReviewEvent::Edited(e) => e.occurred_at,
            ReviewEvent::Moderated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Review {
    type Command = ReviewCommand;
    type Event = ReviewEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReviewEvent::Submitted(e) => {
                self.id = e.review_id;
                self.product_id = Some(e.product_id);
                self.author = Some(e.author);
                self.rating = e.rating;
                self.title = e.title.clone();
                self.content = e.content.clone();
                self.is_approved = false;
                self.created = true;
            }
            ReviewEvent::Edited(e) => {
                self.rating = e.rating;
                self.title = e.title.clone();
                self.content = e.content.clone();
                self.is_approved = false;
            }
            ReviewEvent::Moderated(e) => {
                self.is_approved = e.approved;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReviewCommand::Submit(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("this product already has a review from you"));
                }
                if cmd.review_id != ReviewId::for_author(cmd.product_id, cmd.author) {
                    return Err(DomainError::invariant("review_id does not match product and author"));
                }
                validate_body(cmd.rating, &cmd.title, &cmd.content)?;
                Ok(vec![ReviewEvent::Submitted(ReviewSubmitted {
                    review_id: cmd.review_id,
                    product_id: cmd.product_id,
                    author: cmd.author,
                    rating: cmd.rating,
                    title: cmd.title.trim().to_string(),
                    content: cmd.content.trim().to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReviewCommand::Edit(cmd) => {
                self.ensure_target(cmd.review_id)?;
                if self.author != Some(cmd.author) {
                    return Err(DomainError::Unauthorized);
                }
                validate_body(cmd.rating, &cmd.title, &cmd.content)?;
                Ok(vec![ReviewEvent::Edited(ReviewEdited {
                    review_id: cmd.review_id,
                    rating: cmd.rating,
                    title: cmd.title.trim().to_string(),
                    content: cmd.content.trim().to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReviewCommand::Moderate(cmd) => {
                self.ensure_target(cmd.review_id)?;
                if self.is_approved == cmd.approved {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewEvent::Moderated(ReviewModerated {
                    review_id: cmd.review_id,
                    approved: cmd.approved,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Review {
    fn ensure_target(&self, review_id: ReviewId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if review_id != self.id {
            return Err(DomainError::invariant("review_id mismatch"));
        }
        Ok(())
    }
}

fn validate_body(rating: u8, title: &str, content: &str) -> Result<(), DomainError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(DomainError::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("review title must not be empty"));
    }
    if title.chars().count() > 200 {
        return Err(DomainError::validation("review title must be at most 200 characters"));
    }
    if content.trim().is_empty() {
        return Err(DomainError::validation("review content must not be empty"));
    }
    Ok(())
}
