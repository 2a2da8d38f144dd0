use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storefront_events::Event;

use crate::slug::validate_slug;

/// Category identifier. Derived from the slug, so slugs are unique.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_slug(slug: &str) -> Self {
        Self(AggregateId::derived("catalog.category", slug.as_bytes()))
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Category (optionally nested under a parent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    name: String,
    slug: String,
    parent: Option<CategoryId>,
    description: String,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            name: String::new(),
            slug: String::new(),
            parent: None,
            description: String::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn parent(&self) -> Option<CategoryId> {
        self.parent
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
    UpdateCategory(UpdateCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdated {
    pub category_id: CategoryId,
    pub name: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryUpdated(CategoryUpdated),
}

impl CategoryEvent {
    pub fn category_id(&self) -> CategoryId {
        match self {
            CategoryEvent::CategoryCreated(e) => e.category_id,
            CategoryEvent::CategoryUpdated(e) => e.category_id,
        }
    }
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "catalog.category.created",
            CategoryEvent::CategoryUpdated(_) => "catalog.category.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.name = e.name.clone();
                self.slug = e.slug.clone();
                self.parent = e.parent;
                self.description = e.description.clone();
                self.created = true;
            }
            CategoryEvent::CategoryUpdated(e) => {
                self.name = e.name.clone();
                self.parent = e.parent;
                self.description = e.description.clone();
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category slug already exists"));
                }
                validate_name(&cmd.name)?;
                validate_slug(&cmd.slug)?;
                if cmd.parent == Some(cmd.category_id) {
                    return Err(DomainError::validation("category cannot be its own parent"));
                }
                Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
                    category_id: cmd.category_id,
                    name: cmd.name.trim().to_string(),
                    slug: cmd.slug.clone(),
                    parent: cmd.parent,
                    description: cmd.description.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::UpdateCategory(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found());
                }
                if cmd.category_id != self.id {
                    return Err(DomainError::invariant("category_id mismatch"));
                }
                validate_name(&cmd.name)?;
                if cmd.parent == Some(self.id) {
                    return Err(DomainError::validation("category cannot be its own parent"));
                }
                Ok(vec![CategoryEvent::CategoryUpdated(CategoryUpdated {
                    category_id: cmd.category_id,
                    name: cmd.name.trim().to_string(),
                    parent: cmd.parent,
                    description: cmd.description.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("category name must not be empty"));
    }
    if name.chars().count() > 100 {
        return Err(DomainError::validation("category name must be at most 100 characters"));
    }
    Ok(())
}
