//! Aggregate type names recorded on every stored event.

pub const CATEGORY: &str = "catalog.category";
pub const PRODUCT: &str = "catalog.product";
pub const REVIEW: &str = "catalog.review";
pub const CART: &str = "shop.cart";
pub const DISCOUNT_CODE: &str = "shop.discount";
pub const ORDER: &str = "shop.order";
pub const SHIPPING_METHOD: &str = "shop.shipping_method";
