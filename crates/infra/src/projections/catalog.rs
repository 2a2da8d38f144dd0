//! Storefront catalog read models: categories and products.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_catalog::{CategoryEvent, CategoryId, Pricing, ProductEvent, ProductId, ProductStatus, ProductType};
use storefront_core::Money;
use storefront_events::EventEnvelope;

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub product_id: ProductId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub category: Option<CategoryId>,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub effective_price: Money,
    pub on_sale: bool,
    pub stock: u32,
    pub product_type: ProductType,
    pub status: ProductStatus,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    fn set_pricing(&mut self, pricing: &Pricing) {
        self.price = pricing.price;
        self.sale_price = pricing.sale_price;
        self.effective_price = pricing.effective_price();
        self.on_sale = pricing.is_on_sale();
    }

    pub fn is_listed(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Default)]
pub struct CategoriesProjection<S = InMemoryReadStore<CategoryId, CategoryView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &CategoryId) -> Option<CategoryView> {
        self.store.get(id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<CategoryView> {
        self.store.list().into_iter().find(|c| c.slug == slug)
    }

    /// All categories ordered by name.
    pub fn list(&self) -> Vec<CategoryView> {
        let mut out = self.store.list();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.slug.cmp(&b.slug)));
        out
    }
}

impl<S> Projection for CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::CATEGORY
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CATEGORY {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: CategoryEvent = decode(streams::CATEGORY, envelope)?;
        if ev.category_id().0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            CategoryEvent::CategoryCreated(e) => {
                self.store.upsert(
                    e.category_id,
                    CategoryView {
                        category_id: e.category_id,
                        name: e.name,
                        slug: e.slug,
                        parent: e.parent,
                        description: e.description,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CategoryEvent::CategoryUpdated(e) => {
                if let Some(mut view) = self.store.get(&e.category_id) {
                    view.name = e.name;
                    view.parent = e.parent;
                    view.description = e.description;
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.category_id, view);
                }
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

#[derive(Debug, Default)]
pub struct ProductsProjection<S = InMemoryReadStore<ProductId, ProductView>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductsProjection<S>
where
    S: ReadStore<ProductId, ProductView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &ProductId) -> Option<ProductView> {
        self.store.get(id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<ProductView> {
        self.store.list().into_iter().find(|p| p.slug == slug)
    }

    /// Every product, archived ones included, ordered by title.
    pub fn list(&self) -> Vec<ProductView> {
        let mut out = self.store.list();
        out.sort_by(|a, b| a.title.cmp(&b.title).then(a.slug.cmp(&b.slug)));
        out
    }

    /// Active products, optionally narrowed to one category.
    pub fn list_listed(&self, category: Option<CategoryId>) -> Vec<ProductView> {
        self.list()
            .into_iter()
            .filter(ProductView::is_listed)
            .filter(|p| category.is_none() || p.category == category)
            .collect()
    }
}

impl<S> Projection for ProductsProjection<S>
where
    S: ReadStore<ProductId, ProductView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::PRODUCT
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::PRODUCT {
            return Ok(());
        }
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ProductEvent = decode(streams::PRODUCT, envelope)?;
        if ev.product_id().0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id.to_string()));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                let mut view = ProductView {
                    product_id: e.product_id,
                    title: e.title,
                    slug: e.slug,
                    summary: e.summary,
                    category: e.category,
                    price: Money::ZERO,
                    sale_price: None,
                    effective_price: Money::ZERO,
                    on_sale: false,
                    stock: e.stock,
                    product_type: e.product_type,
                    status: ProductStatus::Active,
                    updated_at: e.occurred_at,
                };
                view.set_pricing(&e.pricing);
                self.store.upsert(e.product_id, view);
            }
            ProductEvent::PricingUpdated(e) => {
                if let Some(mut view) = self.store.get(&e.product_id) {
                    view.set_pricing(&e.pricing);
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.product_id, view);
                }
            }
            ProductEvent::StockAdjusted(e) => {
                if let Some(mut view) = self.store.get(&e.product_id) {
                    view.stock = e.new_stock;
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.product_id, view);
                }
            }
            ProductEvent::ProductArchived(e) => {
                if let Some(mut view) = self.store.get(&e.product_id) {
                    view.status = ProductStatus::Archived;
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.product_id, view);
                }
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
    use chrono::Utc;
    use rust_decimal::Decimal;
    use storefront_catalog::{
        AdjustStock, ArchiveProduct, CreateProduct, Product, ProductCommand, UpdatePricing,
    };
    use storefront_core::AggregateRoot;
    use storefront_events::execute;
    use uuid::Uuid;

    fn envelopes(product: &mut Product, cmd: ProductCommand, from_seq: u64) -> Vec<EventEnvelope<JsonValue>> {
        let events = execute(product, &cmd).unwrap();
        events
            .iter()
            .zip(from_seq..)
            .map(|(e, seq)| {
                EventEnvelope::new(
                    Uuid::now_v7(),
                    product.id().0,
                    streams::PRODUCT,
                    seq,
                    serde_json::to_value(e).unwrap(),
                )
            })
            .collect()
    }

    fn create(slug: &str) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            product_id: ProductId::for_slug(slug),
            title: "Enamel Mug".to_string(),
            slug: slug.to_string(),
            summary: String::new(),
            category: None,
            pricing: Pricing::regular(Decimal::new(1200, 2)),
            stock: 4,
            product_type: ProductType::Physical,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn product_view_follows_pricing_stock_and_archive() {
        let id = ProductId::for_slug("enamel-mug");
        let mut product = Product::empty(id);
        let projection = ProductsProjection::<InMemoryReadStore<_, _>>::default();

        let mut all = envelopes(&mut product, create("enamel-mug"), 1);
        all.extend(envelopes(
            &mut product,
            ProductCommand::UpdatePricing(UpdatePricing {
                product_id: id,
                pricing: Pricing {
                    price: Decimal::new(1200, 2),
                    sale_price: Some(Decimal::new(900, 2)),
                },
                occurred_at: Utc::now(),
            }),
            2,
        ));
        all.extend(envelopes(
            &mut product,
            ProductCommand::AdjustStock(AdjustStock {
                product_id: id,
                delta: -3,
                occurred_at: Utc::now(),
            }),
            3,
        ));
        for env in &all {
            projection.apply_envelope(env).unwrap();
        }

        let view = projection.find_by_slug("enamel-mug").unwrap();
        assert!(view.on_sale);
        assert_eq!(view.effective_price, Decimal::new(900, 2));
        assert_eq!(view.stock, 1);
        assert_eq!(projection.list_listed(None).len(), 1);

        for env in envelopes(
            &mut product,
            ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }),
            4,
        ) {
            projection.apply_envelope(&env).unwrap();
        }
        assert!(projection.list_listed(None).is_empty());
        assert_eq!(projection.list().len(), 1);
    }

    #[test]
    fn redelivered_envelopes_are_ignored() {
        let mut product = Product::empty(ProductId::for_slug("tee"));
        let projection = ProductsProjection::<InMemoryReadStore<_, _>>::default();
        let env = envelopes(&mut product, create("tee"), 1).remove(0);

        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();
        assert_eq!(projection.list().len(), 1);
    }

    #[test]
    fn foreign_streams_are_ignored() {
        let projection = CategoriesProjection::<InMemoryReadStore<_, _>>::default();
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            storefront_core::AggregateId::new(),
            streams::ORDER,
            1,
            serde_json::json!({"anything": true}),
        );
        projection.apply_envelope(&env).unwrap();
        assert!(projection.list().is_empty());
    }
}
