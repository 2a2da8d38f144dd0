//! Shipping methods offered at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, ensure_storable};
use storefront_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingMethodId(pub AggregateId);

impl ShippingMethodId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for ShippingMethodId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: ShippingMethod. Only active methods can be chosen at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingMethod {
    id: ShippingMethodId,
    name: String,
    description: String,
    price: Money,
    is_active: bool,
    version: u64,
    created: bool,
}

impl ShippingMethod {
    pub fn empty(id: ShippingMethodId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            price: Money::ZERO,
            is_active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShippingMethodId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Created and active.
    pub fn is_selectable(&self) -> bool {
        self.created && self.is_active
    }
}

impl AggregateRoot for ShippingMethod {
    type Id = ShippingMethodId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShippingMethod {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateShippingMethod {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetShippingMethodActive {
    pub method_id: ShippingMethodId,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingMethodCommand {
    Create(CreateShippingMethod),
    Update(UpdateShippingMethod),
    SetActive(SetShippingMethodActive),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethodCreated {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethodUpdated {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethodActivityChanged {
    pub method_id: ShippingMethodId,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingMethodEvent {
    Created(ShippingMethodCreated),
    Updated(ShippingMethodUpdated),
    ActivityChanged(ShippingMethodActivityChanged),
}

impl ShippingMethodEvent {
    pub fn method_id(&self) -> ShippingMethodId {
        match self {
            ShippingMethodEvent::Created(e) => e.method_id,
            ShippingMethodEvent::Updated(e) => e.method_id,
            ShippingMethodEvent::ActivityChanged(e) => e.method_id,
        }
    }
}

impl Event for ShippingMethodEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShippingMethodEvent::Created(_) => "shop.shipping_method.created",
            ShippingMethodEvent::Updated(_) => "shop.shipping_method.updated",
            ShippingMethodEvent::ActivityChanged(_) => "shop.shipping_method.activity_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShippingMethodEvent::Created(e) => e.occurred_at,
            ShippingMethodEvent::Updated(e) => e.occurred_at,
            ShippingMethodEvent::ActivityChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ShippingMethod {
    type Command = ShippingMethodCommand;
    type Event = ShippingMethodEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShippingMethodEvent::Created(e) => {
                self.id = e.method_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.is_active = e.is_active;
                self.created = true;
            }
            ShippingMethodEvent::Updated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
            }
            ShippingMethodEvent::ActivityChanged(e) => {
                self.is_active = e.is_active;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShippingMethodCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("shipping method already exists"));
                }
                validate_name(&cmd.name)?;
                validate_price(cmd.price)?;
                Ok(vec![ShippingMethodEvent::Created(ShippingMethodCreated {
                    method_id: cmd.method_id,
                    name: cmd.name.trim().to_string(),
                    description: cmd.description.clone(),
                    price: cmd.price,
                    is_active: cmd.is_active,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ShippingMethodCommand::Update(cmd) => {
                self.ensure_target(cmd.method_id)?;
                validate_name(&cmd.name)?;
                validate_price(cmd.price)?;
                Ok(vec![ShippingMethodEvent::Updated(ShippingMethodUpdated {
                    method_id: cmd.method_id,
                    name: cmd.name.trim().to_string(),
                    description: cmd.description.clone(),
                    price: cmd.price,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ShippingMethodCommand::SetActive(cmd) => {
                self.ensure_target(cmd.method_id)?;
                if self.is_active == cmd.is_active {
                    return Ok(vec![]);
                }
                Ok(vec![ShippingMethodEvent::ActivityChanged(ShippingMethodActivityChanged {
                    method_id: cmd.method_id,
                    is_active: cmd.is_active,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl ShippingMethod {
    fn ensure_target(&self, method_id: ShippingMethodId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if method_id != self.id {
            return Err(DomainError::invariant("method_id mismatch"));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("shipping method name must not be empty"));
    }
    if name.chars().count() > 100 {
        return Err(DomainError::validation("shipping method name must be at most 100 characters"));
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<(), DomainError> {
    if price < Money::ZERO {
        return Err(DomainError::validation("shipping price must not be negative"));
    }
    ensure_storable("shipping price", price)
}
