//! Processed Payment Ledger
//!
//! Remembers which gateway payment ids already triggered notifications so a
//! redelivered webhook does not send a second set of emails.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::Result;

/// Default retention for processed payment ids (30 days)
pub const DEFAULT_LEDGER_TTL_HOURS: i64 = 24 * 30;

/// Ledger of payment ids whose confirmation has been handled
#[async_trait]
pub trait ProcessedPayments: Send + Sync {
    /// Atomically claim a payment id
    ///
    /// Returns `true` only for the first caller; replays and concurrent
    /// deliveries for the same id get `false`.
    async fn claim(&self, payment_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Give a claim back so a later delivery can retry
    async fn release(&self, payment_id: &str) -> Result<()>;

    /// Forget claims older than the retention window
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// In-memory ledger (single process)
pub struct MemoryProcessedPayments {
    claims: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl Default for MemoryProcessedPayments {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProcessedPayments {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_LEDGER_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn contains(&self, payment_id: &str) -> bool {
        self.claims.lock().await.contains_key(payment_id)
    }
}

#[async_trait]
impl ProcessedPayments for MemoryProcessedPayments {
    async fn claim(&self, payment_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut claims = self.claims.lock().await;
        if claims.contains_key(payment_id) {
            return Ok(false);
        }
        claims.insert(payment_id.to_string(), now);
        Ok(true)
    }

    async fn release(&self, payment_id: &str) -> Result<()> {
        self.claims.lock().await.remove(payment_id);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut claims = self.claims.lock().await;
        let before = claims.len();
        let ttl = self.ttl;
        claims.retain(|_, claimed_at| claimed_at.checked_add_signed(ttl).is_none_or(|expiry| now < expiry));
        Ok(before - claims.len())
    }
}
