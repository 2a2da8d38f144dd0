use axum::{Router, routing::get};

pub mod admin_catalog;
pub mod admin_discounts;
pub mod admin_orders;
pub mod cart;
pub mod catalog;
pub mod common;
pub mod discounts;
pub mod orders;
pub mod reviews;
pub mod shipping;
pub mod system;

/// Endpoints open to anonymous callers.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/catalog", catalog::router().merge(reviews::public_router()))
        .nest("/shipping-methods", shipping::public_router())
}

/// Endpoints that require a verified bearer token.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(system::me))
        .nest("/cart", cart::router())
        .nest("/discounts", discounts::router())
        .nest("/orders", orders::router())
        .nest("/reviews", reviews::router())
        .nest(
            "/admin",
            admin_catalog::router()
                .merge(admin_discounts::router())
                .merge(admin_orders::router())
                .merge(reviews::admin_router())
                .merge(shipping::admin_router()),
        )
}
