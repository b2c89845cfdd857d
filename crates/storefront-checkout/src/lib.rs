//! # storefront-checkout
//!
//! Checkout sessions, hosted payment and payment confirmation for the
//! storefront.
//!
//! ## Flow
//!
//! The buyer's cart is parked in a short-lived session, handed to the
//! gateway's hosted payment page, and confirmed asynchronously through a
//! webhook that carries the order back in the preference metadata.
//!
//! ```text
//! ┌──────────┐ init ┌──────────────┐ read ┌────────────┐ preference ┌──────────────┐
//! │   Cart   │─────▶│ SessionStore │─────▶│  Checkout  │───────────▶│ Hosted page  │
//! └──────────┘      └──────────────┘      │  Service   │            │  (gateway)   │
//!                          ▲ sweep        └────────────┘            └──────┬───────┘
//!                   ┌──────┴───────┐                                       │ webhook
//!                   │   Sweeper    │      ┌────────────┐  claim  ┌─────────▼───────┐
//!                   └──────────────┘      │   Mailer   │◀────────│   Reconciler    │
//!                                         └────────────┘         └─────────────────┘
//! ```
//!
//! The webhook never looks the session up: once the session has expired the
//! gateway metadata is the only record of the order.
//!
//! ## Deployment note
//!
//! [`MemorySessionStore`] and [`MemoryProcessedPayments`] live in process
//! memory. A session created on one instance is invisible to another, so
//! running more than one instance needs a shared implementation of
//! [`SessionStore`] and [`ProcessedPayments`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_checkout::{CartSubmission, CheckoutSessions, MemorySessionStore};
//!
//! let sessions = CheckoutSessions::new(Arc::new(MemorySessionStore::new()));
//! let session = sessions.init(submission).await?;
//!
//! // Later, on the checkout page
//! let view = sessions.read(&session.id).await?;
//! println!("total: {}", view.total);
//! ```

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod metadata;
pub mod model;
pub mod notify;
pub mod preference;
pub mod session;
pub mod shipping;
pub mod signature;
pub mod sweeper;
pub mod webhook;

pub use checkout::{CheckoutLink, CheckoutRequest, CheckoutService};
pub use error::{CheckoutError, Result};
pub use gateway::{
    Environment, MercadoPagoClient, MercadoPagoConfig, MockGateway, PaymentDetails, PaymentGateway,
    PaymentStatus, PreferenceCreated,
};
pub use idempotency::{MemoryProcessedPayments, ProcessedPayments};
pub use metadata::OrderMetadata;
pub use model::{Address, CartItem, CartSnapshot, CartSubmission, OrderDetails, Purchaser, ShippingOption};
pub use notify::{LogMailer, MailKind, Mailer, RecordingMailer, ResendConfig, ResendMailer};
pub use preference::{BackUrls, PaymentPreference};
pub use session::{CheckoutId, CheckoutSession, CheckoutSessions, CheckoutView, MemorySessionStore, SessionStore};
pub use shipping::{MelhorEnvioClient, MelhorEnvioConfig, PackageDimensions, ShippingQuote, ShippingQuoter};
pub use signature::{SignatureInput, WebhookVerifier};
pub use sweeper::{SessionSweeper, SweeperHandle};
pub use webhook::{WebhookNotification, WebhookOutcome, WebhookReconciler};
