use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use storefront_catalog::{Pricing, ProductType, Review};
use storefront_core::{Money, round_money};
use storefront_infra::checkout::PricedLine;
use storefront_shop::{Cart, DiscountCode, DiscountRules, Order, OrderStatus, PaymentMethod, PaymentStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    /// Parent category slug.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub summary: String,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_product_type")]
    pub product_type: ProductType,
}

fn default_product_type() -> ProductType {
    ProductType::Physical
}

#[derive(Debug, Deserialize)]
pub struct UpdatePricingRequest {
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
}

impl UpdatePricingRequest {
    pub fn pricing(&self) -> Pricing {
        Pricing {
            price: self.price,
            sale_price: self.sale_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ValidateDiscountRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDiscountRequest {
    pub code: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(flatten)]
    pub rules: DiscountRules,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub discount_code: Option<String>,
    /// Shipping method id; the flat rate applies when absent.
    #[serde(default)]
    pub shipping_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ShippingMethodRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub product_id: String,
    pub rating: u8,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EditReviewRequest {
    pub rating: u8,
    pub title: String,
    pub content: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn cart_to_json(cart: &Cart, priced: &[PricedLine]) -> JsonValue {
    let items = priced
        .iter()
        .map(|p| {
            json!({
                "product_id": p.line.product_id.0.to_string(),
                "title": p.title,
                "quantity": p.line.quantity,
                "unit_price": p.line.unit_price,
                "on_sale": p.line.on_sale,
                "line_total": round_money(p.line.line_total()),
            })
        })
        .collect::<Vec<_>>();
    let total: Money = priced.iter().map(|p| p.line.line_total()).sum();

    json!({
        "cart_id": cart.id_typed().0.to_string(),
        "items": items,
        "item_count": priced.iter().map(|p| p.line.quantity).sum::<u32>(),
        "total": round_money(total),
    })
}

pub fn order_to_json(order: &Order) -> JsonValue {
    json!({
        "id": order.id_typed().0.to_string(),
        "order_number": order.order_number(),
        "user_id": order.user_id().map(|u| u.to_string()),
        "status": order.status(),
        "lines": order.lines(),
        "subtotal": order.subtotal(),
        "shipping_method": order.shipping_method(),
        "shipping_cost": order.shipping_cost(),
        "discount": order.discount(),
        "total": order.total(),
        "shipping_address": order.shipping_address(),
        "notes": order.notes(),
        "payments": order.payments(),
        "amount_paid": order.amount_paid(),
        "placed_at": order.placed_at(),
    })
}

pub fn review_to_json(review: &Review) -> JsonValue {
    json!({
        "id": review.id_typed().0.to_string(),
        "product_id": review.product_id().map(|p| p.0.to_string()),
        "author": review.author().map(|u| u.to_string()),
        "rating": review.rating(),
        "title": review.title(),
        "content": review.content(),
        "is_approved": review.is_approved(),
    })
}

pub fn discount_to_json(code: &DiscountCode) -> JsonValue {
    json!({
        "id": code.id_typed().0.to_string(),
        "code": code.code(),
        "rules": code.rules(),
        "is_active": code.is_active(),
        "times_used": code.times_used(),
        "usages": code.usages(),
        "created_at": code.created_at(),
    })
}
