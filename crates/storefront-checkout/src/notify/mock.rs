//! Recording Mailer
//!
//! For testing. Keeps every order it was asked to send and can be switched
//! into a failing mode, or made to fail a single message once.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MailKind, Mailer};
use crate::error::{CheckoutError, Result};
use crate::model::OrderDetails;

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(MailKind, OrderDetails)>>,
    fail: AtomicBool,
    fail_once: Mutex<Option<MailKind>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with `EmailDispatchFailed`
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail the next send of `kind` only
    pub async fn fail_next(&self, kind: MailKind) {
        *self.fail_once.lock().await = Some(kind);
    }

    pub async fn sent(&self) -> Vec<(MailKind, OrderDetails)> {
        self.sent.lock().await.clone()
    }

    pub async fn count(&self, kind: MailKind) -> usize {
        self.sent.lock().await.iter().filter(|(k, _)| *k == kind).count()
    }

    async fn record(&self, kind: MailKind, order: &OrderDetails) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CheckoutError::EmailDispatchFailed("mock mailer is failing".into()));
        }
        {
            let mut once = self.fail_once.lock().await;
            if *once == Some(kind) {
                *once = None;
                return Err(CheckoutError::EmailDispatchFailed(format!("mock {kind} failed")));
            }
        }
        self.sent.lock().await.push((kind, order.clone()));
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_order_confirmation(&self, order: &OrderDetails) -> Result<()> {
        self.record(MailKind::OrderConfirmation, order).await
    }

    async fn send_owner_notification(&self, order: &OrderDetails) -> Result<()> {
        self.record(MailKind::OwnerNotification, order).await
    }

    fn name(&self) -> &str {
        "RecordingMailer"
    }
}
