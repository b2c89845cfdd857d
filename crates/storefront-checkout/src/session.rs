//! Checkout Sessions
//!
//! Short-lived, server-side holding area for cart snapshots between
//! "customer clicked checkout" and "customer is on the payment page".
//!
//! The in-memory store is per process: a session created on one instance is
//! invisible to another. Run a single instance, or implement [`SessionStore`]
//! over a shared TTL-capable key-value service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CheckoutError, Result};
use crate::model::{CartItem, CartSnapshot, CartSubmission, ShippingOption};

/// Default session lifetime in hours
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Opaque checkout identifier, used as a URL parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutId(String);

impl CheckoutId {
    /// Generate a new random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: CheckoutId,
    pub cart: CartSnapshot,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(cart: CartSnapshot, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: CheckoutId::generate(),
            cart,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// The single expiry predicate shared by reads and sweeps
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session storage trait
///
/// Every method takes the caller's notion of "now" so expiry is decided in
/// one place and can be exercised deterministically.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a validated cart, returning the new session
    async fn put(&self, cart: CartSnapshot, now: DateTime<Utc>) -> Result<CheckoutSession>;

    /// Resolve a session's cart
    ///
    /// Fails with `NotFound` when absent and `Expired` when `now >= expires_at`;
    /// an expired record is removed by the same call.
    async fn get(&self, id: &CheckoutId, now: DateTime<Utc>) -> Result<CartSnapshot>;

    /// Remove every expired record, returning how many were removed
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// In-memory session store
///
/// A single mutex guards the map, so read-then-delete and sweep-delete are
/// both atomic check-and-delete operations.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<CheckoutId, CheckoutSession>>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of records currently held, expired or not
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, cart: CartSnapshot, now: DateTime<Utc>) -> Result<CheckoutSession> {
        let session = CheckoutSession::new(cart, now, self.ttl);
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &CheckoutId, now: DateTime<Utc>) -> Result<CartSnapshot> {
        let mut sessions = self.sessions.lock().await;

        match sessions.get(id) {
            None => Err(CheckoutError::NotFound(id.to_string())),
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(id);
                Err(CheckoutError::Expired(id.to_string()))
            }
            Some(session) => Ok(session.cart.clone()),
        }
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }
}

/// Session contents as returned to the checkout page
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub products: Vec<CartItem>,
    pub shipping: ShippingOption,

    /// Server-side total, rounded to cents
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
}

impl From<&CartSnapshot> for CheckoutView {
    fn from(cart: &CartSnapshot) -> Self {
        Self {
            products: cart.products().to_vec(),
            shipping: cart.shipping().clone(),
            total: cart.total().round_dp(2),
        }
    }
}

/// Session initializer and reader over an injected store
#[derive(Clone)]
pub struct CheckoutSessions {
    store: Arc<dyn SessionStore>,
}

impl CheckoutSessions {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Validate a submitted cart and open a session for it
    pub async fn init(&self, submission: CartSubmission) -> Result<CheckoutSession> {
        let cart = CartSnapshot::try_from(submission)?;
        let session = self.store.put(cart, Utc::now()).await?;

        tracing::info!(
            checkout_id = %session.id,
            items = session.cart.products().len(),
            expires_at = %session.expires_at,
            "Opened checkout session"
        );

        Ok(session)
    }

    /// Resolve a session's cart, enforcing expiry
    pub async fn cart(&self, id: &CheckoutId) -> Result<CartSnapshot> {
        self.store.get(id, Utc::now()).await.inspect_err(|e| {
            tracing::debug!(checkout_id = %id, error = %e, "Checkout lookup failed");
        })
    }

    /// Resolve a session for display, with the total recomputed server-side
    pub async fn read(&self, id: &CheckoutId) -> Result<CheckoutView> {
        let cart = self.cart(id).await?;
        Ok(CheckoutView::from(&cart))
    }
}
