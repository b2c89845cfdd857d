//! Mock Payment Gateway
//!
//! For testing and local demos. Records created preferences and serves
//! payments registered up front.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{PaymentDetails, PaymentGateway, PreferenceCreated};
use crate::error::{CheckoutError, Result};
use crate::preference::PaymentPreference;

/// In-process gateway double
#[derive(Default)]
pub struct MockGateway {
    preferences: Mutex<Vec<PaymentPreference>>,
    payments: Mutex<HashMap<String, PaymentDetails>>,
    fail_preferences: AtomicBool,
    lookups: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `details` for `get_payment(details.id)`
    pub async fn insert_payment(&self, details: PaymentDetails) {
        self.payments
            .lock()
            .await
            .insert(details.id.clone(), details);
    }

    /// Make every `create_preference` call fail
    pub fn fail_preferences(&self, fail: bool) {
        self.fail_preferences.store(fail, Ordering::SeqCst);
    }

    /// Preferences received so far
    pub async fn preferences(&self) -> Vec<PaymentPreference> {
        self.preferences.lock().await.clone()
    }

    /// Number of `get_payment` calls so far
    pub fn payment_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_preference(&self, preference: &PaymentPreference) -> Result<PreferenceCreated> {
        if self.fail_preferences.load(Ordering::SeqCst) {
            return Err(CheckoutError::CheckoutCreationFailed(
                "mock gateway refused the preference".into(),
            ));
        }

        let mut preferences = self.preferences.lock().await;
        preferences.push(preference.clone());
        let id = format!("mock-pref-{}", preferences.len());

        Ok(PreferenceCreated {
            init_point: format!("https://www.mercadopago.com.br/checkout/v1/redirect?pref_id={id}"),
            sandbox_init_point: Some(format!(
                "https://sandbox.mercadopago.com.br/checkout/v1/redirect?pref_id={id}"
            )),
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| CheckoutError::Gateway(format!("payment {payment_id} not found")))
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}
