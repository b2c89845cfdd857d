//! Payment Webhook Reconciliation
//!
//! Turns a verified gateway notification into at most one pair of order
//! emails per payment.
//!
//! ```text
//! Received -> Verified -> Ignored                       (type != "payment")
//!                      -> Fetched -> Ignored            (not confirmed)
//!                                 -> Duplicate          (already claimed)
//!                                 -> Confirmed -> Notified
//! ```
//!
//! Signature verification happens before this module sees the notification
//! (see [`crate::signature`]).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CheckoutError, Result};
use crate::gateway::{PaymentGateway, PaymentStatus, string_or_number};
use crate::idempotency::ProcessedPayments;
use crate::metadata::OrderMetadata;
use crate::model::OrderDetails;
use crate::notify::{MailKind, Mailer};

/// Only notification type acted upon
pub const PAYMENT_EVENT: &str = "payment";

/// Notification body as posted by the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type", default)]
    pub event_type: String,

    #[serde(default)]
    pub data: Option<NotificationData>,
}

/// Only payment events are required to carry an id
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => string_or_number(value).map(Some).map_err(serde::de::Error::custom),
    }
}

impl WebhookNotification {
    /// Parse a raw body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| CheckoutError::WebhookParse(e.to_string()))
    }

    pub fn payment(id: impl Into<String>) -> Self {
        Self {
            event_type: PAYMENT_EVENT.into(),
            data: Some(NotificationData { id: Some(id.into()) }),
        }
    }
}

/// What happened to a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment notification; acknowledged and dropped
    Ignored { event_type: String },

    /// Payment exists but is not a confirmed sale
    NotConfirmed {
        payment_id: String,
        status: PaymentStatus,
    },

    /// Confirmed payment already handled by an earlier delivery
    Duplicate { payment_id: String },

    /// Both emails sent
    Notified { payment_id: String },
}

/// Webhook reconciler
pub struct WebhookReconciler {
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    ledger: Arc<dyn ProcessedPayments>,
}

impl WebhookReconciler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        ledger: Arc<dyn ProcessedPayments>,
    ) -> Self {
        Self {
            gateway,
            mailer,
            ledger,
        }
    }

    /// Process a verified notification
    ///
    /// Errors:
    /// - `WebhookParse`: payment notification without a usable id
    /// - `Gateway`: payment details could not be fetched; nothing was claimed
    /// - `InvalidOrderMetadata`: confirmed payment with unusable metadata; the
    ///   claim is kept since redelivery cannot fix the metadata
    /// - `EmailDispatchFailed`: the claim is released so a redelivery retries;
    ///   a message that already went out is not sent again
    pub async fn handle(&self, notification: &WebhookNotification) -> Result<WebhookOutcome> {
        if notification.event_type != PAYMENT_EVENT {
            tracing::debug!(event_type = %notification.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: notification.event_type.clone(),
            });
        }

        let payment_id = notification
            .data
            .as_ref()
            .and_then(|d| d.id.as_deref())
            .map(str::trim)
            .filter(|id| is_safe_payment_id(id))
            .ok_or_else(|| CheckoutError::WebhookParse("payment notification without a valid id".into()))?
            .to_string();

        self.reconcile(payment_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn reconcile(&self, payment_id: String) -> Result<WebhookOutcome> {
        let payment = self.gateway.get_payment(&payment_id).await?;

        if !payment.is_confirmed() {
            tracing::info!(status = ?payment.status, "Payment not confirmed, nothing to do");
            return Ok(WebhookOutcome::NotConfirmed {
                payment_id,
                status: payment.status,
            });
        }

        if !self.ledger.claim(&payment_id, Utc::now()).await? {
            tracing::info!("Payment already processed, skipping notification");
            return Ok(WebhookOutcome::Duplicate { payment_id });
        }

        let order = OrderMetadata::decode(&payment.metadata)
            .and_then(OrderMetadata::into_order_details)
            .inspect_err(|e| tracing::error!(error = %e, "Confirmed payment carries unusable metadata"))?;

        let computed = order.computed_total();
        if computed != order.total {
            tracing::warn!(
                metadata_total = %order.total,
                computed_total = %computed,
                "Order total disagrees with its line items"
            );
        }

        for kind in MailKind::ALL {
            self.send_once(&payment_id, kind, &order).await?;
        }

        tracing::info!(total = %order.total, email = %order.email, "Order notifications sent");
        Ok(WebhookOutcome::Notified { payment_id })
    }

    /// Send one message unless an earlier delivery already sent it
    ///
    /// On failure both the message claim and the payment claim are released
    /// so a redelivery retries only what is still missing.
    async fn send_once(&self, payment_id: &str, kind: MailKind, order: &OrderDetails) -> Result<()> {
        let key = sent_key(payment_id, kind);
        if !self.ledger.claim(&key, Utc::now()).await? {
            tracing::info!(%kind, "Already sent by an earlier delivery");
            return Ok(());
        }

        if let Err(e) = kind.send(self.mailer.as_ref(), order).await {
            tracing::error!(error = %e, %kind, mailer = self.mailer.name(), "Order email dispatch failed");
            self.ledger.release(&key).await?;
            self.ledger.release(payment_id).await?;
            return Err(e);
        }
        Ok(())
    }
}

/// Ledger key for one message of one payment; `:` never occurs in a payment id
fn sent_key(payment_id: &str, kind: MailKind) -> String {
    format!("{payment_id}:{kind}")
}

/// Gateway ids are numeric in practice; accept a conservative character set
/// since the id ends up in a request path.
fn is_safe_payment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
