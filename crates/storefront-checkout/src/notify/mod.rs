//! Order Notifications
//!
//! Transactional email for confirmed orders: one message to the buyer, one to
//! the store operator. Delivery goes through the [`Mailer`] port so the
//! reconciler never depends on a particular provider.

pub mod mock;
mod resend;
pub mod templates;

pub use mock::RecordingMailer;
pub use resend::{ResendConfig, ResendMailer};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::OrderDetails;

/// Which of the two order messages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailKind {
    OrderConfirmation,
    OwnerNotification,
}

impl MailKind {
    /// Both messages, in send order
    pub const ALL: [Self; 2] = [Self::OrderConfirmation, Self::OwnerNotification];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::OwnerNotification => "owner_notification",
        }
    }

    /// Send this message through `mailer`
    pub async fn send(self, mailer: &dyn Mailer, order: &OrderDetails) -> Result<()> {
        match self {
            Self::OrderConfirmation => mailer.send_order_confirmation(order).await,
            Self::OwnerNotification => mailer.send_owner_notification(order).await,
        }
    }
}

impl std::fmt::Display for MailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound mail port
///
/// Each send is independent; callers decide whether to retry. Failures are
/// reported as `CheckoutError::EmailDispatchFailed`.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Confirmation to the purchaser
    async fn send_order_confirmation(&self, order: &OrderDetails) -> Result<()>;

    /// New-sale notice to the store operator
    async fn send_owner_notification(&self, order: &OrderDetails) -> Result<()>;

    /// Mailer name
    fn name(&self) -> &str;
}

/// Mailer for environments without email credentials; logs and succeeds
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_order_confirmation(&self, order: &OrderDetails) -> Result<()> {
        tracing::info!(
            to = %order.email,
            subject = templates::CONFIRMATION_SUBJECT,
            total = %order.total,
            "Mail disabled, order confirmation not sent"
        );
        Ok(())
    }

    async fn send_owner_notification(&self, order: &OrderDetails) -> Result<()> {
        tracing::info!(
            customer = %order.name,
            subject = templates::OWNER_SUBJECT,
            total = %order.total,
            "Mail disabled, owner notification not sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LogMailer"
    }
}
