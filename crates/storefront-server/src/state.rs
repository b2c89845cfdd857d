//! Application State

use std::sync::Arc;

use storefront_checkout::{
    CheckoutService, CheckoutSessions, Environment, Mailer, ShippingQuoter, WebhookReconciler,
    WebhookVerifier,
};

/// Payment integration, present only when gateway credentials are configured
#[derive(Clone)]
pub struct Payments {
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<WebhookReconciler>,
    pub verifier: WebhookVerifier,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout session initializer and reader
    pub sessions: CheckoutSessions,

    /// Gateway-backed checkout and webhook handling (None if not configured)
    pub payments: Option<Payments>,

    /// Outbound mail; a logging mailer when mail is not configured
    pub mailer: Arc<dyn Mailer>,

    /// Whether `mailer` actually delivers
    pub mail_configured: bool,

    /// Carrier quotes (None if not configured)
    pub shipping: Option<Arc<dyn ShippingQuoter>>,

    pub environment: Environment,
}
