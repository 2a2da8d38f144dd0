//! Checkout: cart → order, with discount evaluation and redemption.
//!
//! ```text
//! 1. Load cart, build snapshot from current product state
//! 2. Evaluate discount code (optional), resolve shipping method (optional)
//! 3. PlaceOrder on a fresh Order stream
//! 4. RecordRedemption on the code stream (retried on races)
//!      └─ rejected → compensate: cancel the order
//! 5. CheckOutItems: remove the ordered quantities, keep anything added since
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use storefront_catalog::{Product, ProductId};
use storefront_core::{Money, UserId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_shop::{
    AppliedDiscount, Cart, CartCommand, CartId, CartItem, CartLine, CartSnapshot, ChangeOrderStatus, CheckOutItems,
    Customer, DiscountCode, DiscountCodeCommand, DiscountCodeId, DiscountLookup, DiscountOutcome, DiscountRejection,
    EvaluationError, Order, OrderCommand, OrderId, OrderLine, OrderStatus, PlaceOrder, RecordRedemption,
    ShippingChoice, ShippingMethod, ShippingMethodId, evaluate,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::streams;

/// Attempts allowed for writes that may race with other checkouts.
const WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("shipping method is not available")]
    ShippingMethodUnavailable,
    #[error(transparent)]
    Discount(#[from] DiscountRejection),
    /// Evaluation passed but the code was used up before it could be redeemed.
    #[error("discount code could not be redeemed: {0}")]
    RedemptionRejected(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<EvaluationError<DispatchError>> for CheckoutError {
    fn from(value: EvaluationError<DispatchError>) -> Self {
        match value {
            EvaluationError::Rejected(r) => CheckoutError::Discount(r),
            EvaluationError::Lookup(e) => CheckoutError::Dispatch(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub email: Option<String>,
    pub shipping_address: String,
    pub notes: String,
    pub discount_code: Option<String>,
    /// Falls back to the configured flat rate when absent.
    pub shipping_method: Option<ShippingMethodId>,
}

/// Reads discount codes straight from their event streams.
pub struct StoreDiscountLookup<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
}

impl<'a, S, B> StoreDiscountLookup<'a, S, B> {
    pub fn new(dispatcher: &'a CommandDispatcher<S, B>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> DiscountLookup for StoreDiscountLookup<'_, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    type Error = DispatchError;

    fn find_code(&self, code: &str) -> Result<Option<DiscountCode>, Self::Error> {
        let discount = load_discount_code(self.dispatcher, code)?;
        Ok(discount.exists().then_some(discount))
    }
}

pub fn load_discount_code<S, B>(dispatcher: &CommandDispatcher<S, B>, code: &str) -> Result<DiscountCode, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    dispatcher.load(DiscountCodeId::for_code(code).0, |id| DiscountCode::empty(DiscountCodeId(id)))
}

pub fn load_cart<S, B>(dispatcher: &CommandDispatcher<S, B>, user_id: UserId) -> Result<Cart, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    dispatcher.load(CartId::for_user(user_id).0, |id| Cart::empty(CartId(id)))
}

pub fn load_shipping_method<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    method_id: ShippingMethodId,
) -> Result<ShippingMethod, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    dispatcher.load(method_id.0, |id| ShippingMethod::empty(ShippingMethodId::new(id)))
}

pub fn load_product<S, B>(dispatcher: &CommandDispatcher<S, B>, product_id: ProductId) -> Result<Product, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    dispatcher.load(product_id.0, |id| Product::empty(ProductId::new(id)))
}

/// A priced cart line together with the product title it was built from.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub line: CartLine,
    pub title: String,
}

/// Join cart items with current product state. Items whose product is gone
/// or archived are skipped.
pub fn price_cart<S, B>(dispatcher: &CommandDispatcher<S, B>, cart: &Cart) -> Result<Vec<PricedLine>, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let mut lines = Vec::with_capacity(cart.items().len());
    for item in cart.items() {
        let product = load_product(dispatcher, item.product_id)?;
        if !product.can_be_sold() {
            debug!(product_id = %item.product_id.0, "skipping unavailable product in cart");
            continue;
        }
        lines.push(PricedLine {
            line: CartLine {
                product_id: item.product_id,
                category_id: product.category(),
                quantity: item.quantity,
                unit_price: product.pricing().effective_price(),
                on_sale: product.pricing().is_on_sale(),
            },
            title: product.title().to_string(),
        });
    }
    Ok(lines)
}

pub fn cart_snapshot<S, B>(dispatcher: &CommandDispatcher<S, B>, cart: &Cart) -> Result<CartSnapshot, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let lines = price_cart(dispatcher, cart)?;
    Ok(CartSnapshot::new(lines.into_iter().map(|p| p.line).collect()))
}

/// Evaluate `code` against the user's current cart. No side effects.
pub fn evaluate_for_user<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    code: &str,
    customer: &Customer,
    now: DateTime<Utc>,
) -> Result<DiscountOutcome, CheckoutError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let cart = load_cart(dispatcher, customer.user_id)?;
    let snapshot = cart_snapshot(dispatcher, &cart)?;
    let outcome = evaluate(&StoreDiscountLookup::new(dispatcher), code, customer, &snapshot, now)?;
    Ok(outcome)
}

pub fn place_order<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    flat_shipping: Money,
    request: CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<Order, CheckoutError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let cart = load_cart(dispatcher, request.user_id)?;
    let priced = price_cart(dispatcher, &cart)?;
    if priced.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let shipping_method = match request.shipping_method {
        Some(method_id) => {
            let method = load_shipping_method(dispatcher, method_id)?;
            if !method.is_selectable() {
                return Err(CheckoutError::ShippingMethodUnavailable);
            }
            Some(method)
        }
        None => None,
    };

    let customer = Customer {
        user_id: request.user_id,
        email: request.email.clone(),
    };
    let outcome = match request.discount_code.as_deref() {
        Some(code) => {
            let snapshot = CartSnapshot::new(priced.iter().map(|p| p.line.clone()).collect());
            Some(evaluate(&StoreDiscountLookup::new(dispatcher), code, &customer, &snapshot, now)?)
        }
        None => None,
    };

    let shipping_cost = match (&outcome, &shipping_method) {
        (Some(o), _) if o.free_shipping => Money::ZERO,
        (_, Some(method)) => method.price(),
        (_, None) => flat_shipping,
    };

    let order_id = OrderId::generate();
    let order: Order = dispatcher.execute(
        order_id.0,
        streams::ORDER,
        OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id: request.user_id,
            lines: priced
                .iter()
                .map(|p| OrderLine::new(p.line.product_id, p.title.clone(), p.line.quantity, p.line.unit_price))
                .collect(),
            shipping_method: shipping_method.as_ref().map(|m| ShippingChoice {
                method_id: m.id_typed(),
                name: m.name().to_string(),
            }),
            shipping_cost,
            discount: outcome.as_ref().map(|o| AppliedDiscount {
                code: o.code.clone(),
                amount: o.discount_amount,
                free_shipping: o.free_shipping,
            }),
            shipping_address: request.shipping_address,
            notes: request.notes,
            occurred_at: now,
        }),
        |id| Order::empty(OrderId::new(id)),
    )?;

    if let Some(outcome) = &outcome {
        if let Err(err) = redeem(dispatcher, outcome, &customer, order_id, now) {
            warn!(order_id = %order_id.0, code = %outcome.code, error = %err, "redemption failed, cancelling order");
            dispatcher.dispatch(
                order_id.0,
                streams::ORDER,
                OrderCommand::ChangeStatus(ChangeOrderStatus {
                    order_id,
                    status: OrderStatus::Cancelled,
                    occurred_at: now,
                }),
                |id| Order::empty(OrderId::new(id)),
            )?;
            return Err(match err {
                DispatchError::Conflict(msg) => CheckoutError::RedemptionRejected(msg),
                other => CheckoutError::Dispatch(other),
            });
        }
    }

    dispatcher.dispatch_with_retry(
        CartId::for_user(request.user_id).0,
        streams::CART,
        CartCommand::CheckOutItems(CheckOutItems {
            cart_id: CartId::for_user(request.user_id),
            user_id: request.user_id,
            order_id,
            items: priced
                .iter()
                .map(|p| CartItem {
                    product_id: p.line.product_id,
                    quantity: p.line.quantity,
                })
                .collect(),
            occurred_at: now,
        }),
        |id| Cart::empty(CartId(id)),
        WRITE_ATTEMPTS,
    )?;

    info!(order_id = %order_id.0, order_number = order.order_number(), total = %order.total(), "order placed");
    Ok(order)
}

fn redeem<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    outcome: &DiscountOutcome,
    customer: &Customer,
    order_id: OrderId,
    now: DateTime<Utc>,
) -> Result<DiscountCode, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let code_id = DiscountCodeId::for_code(&outcome.code);
    dispatcher.dispatch_with_retry(
        code_id.0,
        streams::DISCOUNT_CODE,
        DiscountCodeCommand::RecordRedemption(RecordRedemption {
            code_id,
            user_id: customer.user_id,
            order_id,
            email: customer.email.clone(),
            occurred_at: now,
        }),
        |id| DiscountCode::empty(DiscountCodeId(id)),
        WRITE_ATTEMPTS,
    )
}
