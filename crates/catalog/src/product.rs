use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, ensure_storable};
use storefront_events::Event;

use crate::category::CategoryId;
use crate::slug::validate_slug;

/// Product identifier. Derived from the slug.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_slug(slug: &str) -> Self {
        Self(AggregateId::derived("catalog.product", slug.as_bytes()))
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Physical,
    Virtual,
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Regular price plus an optional sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Money>,
}

impl Pricing {
    pub fn regular(price: Money) -> Self {
        Self {
            price,
            sale_price: None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.price <= Money::ZERO {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        ensure_storable("price", self.price)?;
        if let Some(sale) = self.sale_price {
            if sale <= Money::ZERO {
                return Err(DomainError::validation("sale price must be greater than zero"));
            }
            if sale > self.price {
                return Err(DomainError::validation("sale price must not exceed price"));
            }
        }
        Ok(())
    }

    pub fn is_on_sale(&self) -> bool {
        self.sale_price.is_some()
    }

    /// Price a customer pays per unit.
    pub fn effective_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    title: String,
    slug: String,
    summary: String,
    category: Option<CategoryId>,
    pricing: Pricing,
    stock: u32,
    product_type: ProductType,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            title: String::new(),
            slug: String::new(),
            summary: String::new(),
            category: None,
            pricing: Pricing::regular(Money::ZERO),
            stock: 0,
            product_type: ProductType::Physical,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Only created, non-archived products can be put in a cart.
    pub fn can_be_sold(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub category: Option<CategoryId>,
    pub pricing: Pricing,
    pub stock: u32,
    pub product_type: ProductType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePricing {
    pub product_id: ProductId,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (signed delta).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdatePricing(UpdatePricing),
    AdjustStock(AdjustStock),
    ArchiveProduct(ArchiveProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub category: Option<CategoryId>,
    pub pricing: Pricing,
    pub stock: u32,
    pub product_type: ProductType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingUpdated {
    pub product_id: ProductId,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. Carries the resulting level so replay needs no arithmetic checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub delta: i64,
    pub new_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    PricingUpdated(PricingUpdated),
    StockAdjusted(StockAdjusted),
    ProductArchived(ProductArchived),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::PricingUpdated(e) => e.product_id,
            ProductEvent::StockAdjusted(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::PricingUpdated(_) => "catalog.product.pricing_updated",
            ProductEvent::StockAdjusted(_) => "catalog.product.stock_adjusted",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::PricingUpdated(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.title = e.title.clone();
                self.slug = e.slug.clone();
                self.summary = e.summary.clone();
                self.category = e.category;
                self.pricing = e.pricing;
                self.stock = e.stock;
                self.product_type = e.product_type;
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::PricingUpdated(e) => {
                self.pricing = e.pricing;
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock = e.new_stock;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdatePricing(cmd) => self.handle_update_pricing(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_created(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if product_id != self.id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product slug already exists"));
        }

        let title = cmd.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("product title must not be empty"));
        }
        if title.chars().count() > 200 {
            return Err(DomainError::validation("product title must be at most 200 characters"));
        }
        validate_slug(&cmd.slug)?;
        cmd.pricing.validate()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            title: title.to_string(),
            slug: cmd.slug.clone(),
            summary: cmd.summary.clone(),
            category: cmd.category,
            pricing: cmd.pricing,
            stock: cmd.stock,
            product_type: cmd.product_type,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_pricing(&self, cmd: &UpdatePricing) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;
        cmd.pricing.validate()?;

        Ok(vec![ProductEvent::PricingUpdated(PricingUpdated {
            product_id: cmd.product_id,
            pricing: cmd.pricing,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;
        if cmd.delta == 0 {
            return Err(DomainError::validation("stock delta must not be zero"));
        }

        let new_stock = i64::from(self.stock) + cmd.delta;
        if new_stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        let new_stock = u32::try_from(new_stock)
            .map_err(|_| DomainError::validation("stock level out of range"))?;

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            delta: cmd.delta,
            new_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
