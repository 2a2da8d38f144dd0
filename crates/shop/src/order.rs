use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId, ensure_storable, round_money};
use storefront_events::Event;

use crate::shipping::ShippingMethodId;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// A priced order line, frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderLine {
    pub fn new(product_id: ProductId, title: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            title: title.into(),
            quantity,
            unit_price,
            line_total: round_money(unit_price.saturating_mul(Money::from(quantity))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: Money,
    pub free_shipping: bool,
}

/// The shipping method chosen at checkout, as it was named then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingChoice {
    pub method_id: ShippingMethodId,
    pub name: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Online,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// A payment recorded against an order. `payment_date` is set once it completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    subtotal: Money,
    shipping_method: Option<ShippingChoice>,
    shipping_cost: Money,
    discount: Option<AppliedDiscount>,
    total: Money,
    shipping_address: String,
    notes: String,
    payments: Vec<Payment>,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            user_id: None,
            status: OrderStatus::Pending,
            lines: Vec::new(),
            subtotal: Money::ZERO,
            shipping_method: None,
            shipping_cost: Money::ZERO,
            discount: None,
            total: Money::ZERO,
            shipping_address: String::new(),
            notes: String::new(),
            payments: Vec::new(),
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_method(&self) -> Option<&ShippingChoice> {
        self.shipping_method.as_ref()
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount(&self) -> Option<&AppliedDiscount> {
        self.discount.as_ref()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payment(&self, payment_id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.payment_id == payment_id)
    }

    /// Sum of completed payments.
    pub fn amount_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount)
            .sum()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Human-facing order reference, e.g. `ORD-20261014-0192A4F3`.
pub fn order_number(order_id: OrderId, placed_at: DateTime<Utc>) -> String {
    let simple = order_id.0.as_uuid().simple().to_string().to_uppercase();
    format!("ORD-{}-{}", placed_at.format("%Y%m%d"), &simple[simple.len() - 8..])
}

/// Order totals: the discount never takes the goods below zero, shipping is added on top.
pub fn order_total(subtotal: Money, discount: Money, shipping_cost: Money) -> Money {
    round_money((subtotal - discount).max(Money::ZERO) + shipping_cost)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_method: Option<ShippingChoice>,
    pub shipping_cost: Money,
    pub discount: Option<AppliedDiscount>,
    pub shipping_address: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePaymentStatus {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeOrderStatus),
    RecordPayment(RecordPayment),
    ChangePaymentStatus(ChangePaymentStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    #[serde(default)]
    pub shipping_method: Option<ShippingChoice>,
    pub shipping_cost: Money,
    pub discount: Option<AppliedDiscount>,
    pub total: Money,
    pub shipping_address: String,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusChanged {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
    PaymentRecorded(PaymentRecorded),
    PaymentStatusChanged(PaymentStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "shop.order.placed",
            OrderEvent::OrderStatusChanged(_) => "shop.order.status_changed",
            OrderEvent::PaymentRecorded(_) => "shop.order.payment_recorded",
            OrderEvent::PaymentStatusChanged(_) => "shop.order.payment_status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
            OrderEvent::PaymentRecorded(e) => e.occurred_at,
            OrderEvent::PaymentStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.user_id = Some(e.user_id);
                self.status = OrderStatus::Pending;
                self.lines = e.lines.clone();
                self.subtotal = e.subtotal;
                self.shipping_method = e.shipping_method.clone();
                self.shipping_cost = e.shipping_cost;
                self.discount = e.discount.clone();
                self.total = e.total;
                self.shipping_address = e.shipping_address.clone();
                self.notes = e.notes.clone();
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::PaymentRecorded(e) => {
                self.payments.push(Payment {
                    payment_id: e.payment_id,
                    amount: e.amount,
                    method: e.method,
                    status: PaymentStatus::Pending,
                    transaction_id: e.transaction_id.clone(),
                    payment_date: None,
                    created_at: e.occurred_at,
                });
            }
            OrderEvent::PaymentStatusChanged(e) => {
                if let Some(payment) = self.payments.iter_mut().find(|p| p.payment_id == e.payment_id) {
                    payment.status = e.to;
                    if e.to == PaymentStatus::Completed {
                        payment.payment_date = Some(e.occurred_at);
                    }
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            OrderCommand::ChangePaymentStatus(cmd) => self.handle_payment_status(cmd),
        }
    }
}

impl Order {
    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.order_id != self.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation("order line quantity must be at least 1"));
        }
        if cmd.lines.iter().any(|l| l.unit_price < Money::ZERO) {
            return Err(DomainError::validation("order line price must not be negative"));
        }
        if cmd.shipping_cost < Money::ZERO {
            return Err(DomainError::validation("shipping cost must not be negative"));
        }
        if cmd.shipping_address.trim().is_empty() {
            return Err(DomainError::validation("shipping address is required"));
        }

        let discount_amount = match &cmd.discount {
            Some(d) if d.amount < Money::ZERO => {
                return Err(DomainError::validation("discount amount must not be negative"));
            }
            Some(d) => d.amount,
            None => Money::ZERO,
        };

        // Recompute line totals rather than trusting the caller.
        let lines: Vec<OrderLine> = cmd
            .lines
            .iter()
            .map(|l| OrderLine::new(l.product_id, l.title.clone(), l.quantity, l.unit_price))
            .collect();
        let subtotal = round_money(lines.iter().map(|l| l.line_total).sum());
        let total = order_total(subtotal, discount_amount, cmd.shipping_cost);

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            order_number: order_number(cmd.order_id, cmd.occurred_at),
            user_id: cmd.user_id,
            lines,
            subtotal,
            shipping_method: cmd.shipping_method.clone(),
            shipping_cost: cmd.shipping_cost,
            discount: cmd.discount.clone(),
            total,
            shipping_address: cmd.shipping_address.trim().to_string(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn ensure_target(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if order_id != self.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.order_id)?;
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(DomainError::invariant(format!(
                "cannot take payment for a {} order",
                self.status.as_str()
            )));
        }
        if self.payment(cmd.payment_id).is_some() {
            return Err(DomainError::conflict("payment already recorded"));
        }
        if cmd.amount <= Money::ZERO {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        ensure_storable("payment amount", cmd.amount)?;
        if cmd.transaction_id.chars().count() > 100 {
            return Err(DomainError::validation("transaction id must be at most 100 characters"));
        }

        Ok(vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            order_id: cmd.order_id,
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            method: cmd.method,
            transaction_id: cmd.transaction_id.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment_status(&self, cmd: &ChangePaymentStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.order_id)?;
        let payment = self.payment(cmd.payment_id).ok_or(DomainError::NotFound)?;
        if !payment.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot move payment from {} to {}",
                payment.status.as_str(),
                cmd.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::PaymentStatusChanged(PaymentStatusChanged {
            order_id: cmd.order_id,
            payment_id: cmd.payment_id,
            from: payment.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeOrderStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.order_id)?;
        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {} to {}",
                self.status.as_str(),
                cmd.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use storefront_events::execute;

    fn money(cents: i64) -> Money {
        Decimal::new(cents, 2)
    }

    fn place(order_id: OrderId, discount: Option<AppliedDiscount>, shipping: Money) -> OrderCommand {
        OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id: UserId::new(),
            lines: vec![
                OrderLine::new(ProductId::for_slug("mug"), "Mug", 2, money(1250)),
                OrderLine::new(ProductId::for_slug("tee"), "Tee", 1, money(1999)),
            ],
            shipping_method: None,
            shipping_cost: shipping,
            discount,
            shipping_address: " 1 Main St ".to_string(),
            notes: String::new(),
            occurred_at: Utc::now(),
        })
    }

    fn change(order_id: OrderId, status: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus(ChangeOrderStatus {
            order_id,
            status,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn place_order_computes_totals() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        let discount = AppliedDiscount {
            code: "TEN".to_string(),
            amount: money(1000),
            free_shipping: false,
        };

        execute(&mut order, &place(id, Some(discount), money(500))).unwrap();

        assert_eq!(order.subtotal(), money(4499));
        assert_eq!(order.total(), money(3999));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.shipping_address(), "1 Main St");
        assert!(order.order_number().starts_with("ORD-"));
    }

    #[test]
    fn discount_larger_than_subtotal_floors_goods_at_zero() {
        assert_eq!(order_total(money(1000), money(2500), money(700)), money(700));
    }

    #[test]
    fn order_without_lines_is_rejected() {
        let id = OrderId::generate();
        let err = Order::empty(id)
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: id,
                user_id: UserId::new(),
                lines: vec![],
                shipping_method: None,
                shipping_cost: Money::ZERO,
                discount: None,
                shipping_address: "1 Main St".to_string(),
                notes: String::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn status_follows_transition_table() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        execute(&mut order, &place(id, None, Money::ZERO)).unwrap();

        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Refunded,
        ] {
            execute(&mut order, &change(id, status)).unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.version(), 5);

        let err = order.handle(&change(id, OrderStatus::Pending)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));
    }

    fn pay(order_id: OrderId, payment_id: PaymentId, cents: i64) -> OrderCommand {
        OrderCommand::RecordPayment(RecordPayment {
            order_id,
            payment_id,
            amount: money(cents),
            method: PaymentMethod::Online,
            transaction_id: " tx-42 ".to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn settle(order_id: OrderId, payment_id: PaymentId, status: PaymentStatus) -> OrderCommand {
        OrderCommand::ChangePaymentStatus(ChangePaymentStatus {
            order_id,
            payment_id,
            status,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn payments_are_recorded_and_settled() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        execute(&mut order, &place(id, None, Money::ZERO)).unwrap();

        let payment_id = PaymentId::generate();
        execute(&mut order, &pay(id, payment_id, 4499)).unwrap();
        assert_eq!(order.payment(payment_id).unwrap().status, PaymentStatus::Pending);
        assert_eq!(order.payment(payment_id).unwrap().transaction_id, "tx-42");
        assert_eq!(order.amount_paid(), Money::ZERO);

        execute(&mut order, &settle(id, payment_id, PaymentStatus::Completed)).unwrap();
        let payment = order.payment(payment_id).unwrap();
        assert!(payment.payment_date.is_some());
        assert_eq!(order.amount_paid(), money(4499));

        let err = order.handle(&settle(id, payment_id, PaymentStatus::Failed)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        execute(&mut order, &settle(id, payment_id, PaymentStatus::Refunded)).unwrap();
        assert_eq!(order.amount_paid(), Money::ZERO);
    }

    #[test]
    fn payment_rules() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        assert_eq!(order.handle(&pay(id, PaymentId::generate(), 100)).unwrap_err(), DomainError::NotFound);
        execute(&mut order, &place(id, None, Money::ZERO)).unwrap();

        assert!(matches!(
            order.handle(&pay(id, PaymentId::generate(), 0)),
            Err(DomainError::Validation(_))
        ));
        let payment_id = PaymentId::generate();
        execute(&mut order, &pay(id, payment_id, 100)).unwrap();
        assert!(matches!(order.handle(&pay(id, payment_id, 100)), Err(DomainError::Conflict(_))));
        assert_eq!(
            order.handle(&settle(id, PaymentId::generate(), PaymentStatus::Completed)).unwrap_err(),
            DomainError::NotFound
        );

        execute(&mut order, &change(id, OrderStatus::Cancelled)).unwrap();
        assert!(matches!(
            order.handle(&pay(id, PaymentId::generate(), 100)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let id = OrderId::generate();
        let order = Order::empty(id);
        let before = order.clone();
        let _ = order.handle(&place(id, None, Money::ZERO));
        assert_eq!(order, before);
    }
}
