//! Shop domain: carts, discount codes and their evaluator, orders,
//! payments and shipping methods.
//!
//! Pure decision logic only. Loading, persisting and cross-aggregate
//! orchestration (checkout) live in `storefront-infra`.

pub mod cart;
pub mod discount;
pub mod order;
pub mod shipping;

pub use cart::{
    AddItem, Cart, CartCleared, CartCommand, CartEvent, CartId, CartItem, CheckOutItems, ClearCart, ItemAdded,
    ItemRemoved, ItemsCheckedOut, QuantitySet, RemoveItem, SetQuantity,
};
pub use discount::{
    ActivateDiscountCode, CartLine, CartSnapshot, CreateDiscountCode, Customer, DeactivateDiscountCode,
    DiscountCode, DiscountCodeActivated, DiscountCodeCommand, DiscountCodeCreated,
    DiscountCodeDeactivated, DiscountCodeEvent, DiscountCodeId, DiscountLookup, DiscountOutcome,
    DiscountRedeemed, DiscountRejection, DiscountRules, DiscountRulesUpdated, DiscountType,
    DiscountUsage, EvaluationError, RecordRedemption, UpdateDiscountRules, evaluate,
};
pub use order::{
    AppliedDiscount, ChangeOrderStatus, ChangePaymentStatus, Order, OrderCommand, OrderEvent, OrderId, OrderLine,
    OrderPlaced, OrderStatus, OrderStatusChanged, Payment, PaymentId, PaymentMethod, PaymentRecorded,
    PaymentStatus, PaymentStatusChanged, PlaceOrder, RecordPayment, ShippingChoice,
};
pub use shipping::{
    CreateShippingMethod, SetShippingMethodActive, ShippingMethod, ShippingMethodActivityChanged,
    ShippingMethodCommand, ShippingMethodCreated, ShippingMethodEvent, ShippingMethodId, ShippingMethodUpdated,
    UpdateShippingMethod,
};
