//! Storefront HTTP Server
//!
//! Axum router over the checkout pipeline. The binary in `main.rs` wires the
//! real integrations; tests build the router around mocks.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_checkout, get_checkout, health_check, init_checkout, payment_webhook, quote_shipping,
    test_email,
};
pub use crate::config::ServerConfig;
pub use crate::state::{AppState, Payments};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Checkout sessions
        .route("/checkout/init", post(init_checkout))
        .route("/checkout/{id}", get(get_checkout))
        // Payments
        .route("/checkout", post(create_checkout))
        .route("/checkout/webhook", post(payment_webhook))
        // Shipping
        .route("/shipping", post(quote_shipping))
        // Development
        .route("/dev/test-email", post(test_email))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
