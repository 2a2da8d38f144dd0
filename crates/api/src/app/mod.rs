//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store/bus, dispatcher, projections, worker
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request bodies and JSON mapping helpers
//! - `errors.rs`: the `{"error", "message"}` error contract
//! - `extract.rs`: `ApiJson`, the body extractor behind that contract

use std::io;
use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use storefront_auth::Hs256JwtValidator;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// A built application: the router plus the services behind it, kept so the
/// caller can stop background work on shutdown.
pub struct App {
    pub router: Router,
    pub services: Arc<services::AppServices>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> io::Result<App> {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(config.flat_shipping)?);

    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let router = routes::public_router()
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .layer(Extension(services.clone()));

    Ok(App { router, services })
}
