//! Mercado Pago Gateway
//!
//! Hosted checkout ("Checkout Pro") over the REST API: preferences are
//! created with `POST /checkout/preferences`, payments are read back with
//! `GET /v1/payments/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{PaymentDetails, PaymentGateway, PreferenceCreated};
use crate::error::{CheckoutError, Result};
use crate::preference::PaymentPreference;

/// Mercado Pago client configuration
#[derive(Clone)]
pub struct MercadoPagoConfig {
    /// Bearer access token
    pub access_token: String,

    /// Shared secret for webhook signatures
    pub webhook_secret: String,

    /// API base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for MercadoPagoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoPagoConfig")
            .field("access_token", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MercadoPagoConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.mercadopago.com";

    pub fn new(access_token: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            webhook_secret: webhook_secret.into(),
            api_base_url: Self::DEFAULT_API_URL.into(),
            timeout_secs: 30,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("MERCADO_PAGO_ACCESS_TOKEN")
            .map_err(|_| CheckoutError::Config("MERCADO_PAGO_ACCESS_TOKEN not set".into()))?;
        let webhook_secret = std::env::var("MERCADO_PAGO_WEBHOOK_SECRET")
            .map_err(|_| CheckoutError::Config("MERCADO_PAGO_WEBHOOK_SECRET not set".into()))?;

        let mut config = Self::new(access_token, webhook_secret);
        if let Ok(url) = std::env::var("MERCADO_PAGO_API_URL") {
            config.api_base_url = url;
        }
        Ok(config)
    }
}

/// Mercado Pago REST client
pub struct MercadoPagoClient {
    http: Client,
    config: MercadoPagoConfig,
}

impl MercadoPagoClient {
    pub fn new(config: MercadoPagoConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(MercadoPagoConfig::from_env()?)
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[tracing::instrument(skip(self, preference), fields(reference = %preference.external_reference))]
    async fn create_preference(&self, preference: &PaymentPreference) -> Result<PreferenceCreated> {
        let response = self
            .http
            .post(self.url("/checkout/preferences"))
            .bearer_auth(&self.config.access_token)
            .json(preference)
            .send()
            .await
            .map_err(|e| CheckoutError::CheckoutCreationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::CheckoutCreationFailed(format!(
                "preference rejected ({status}): {body}"
            )));
        }

        let created: PreferenceCreated = response
            .json()
            .await
            .map_err(|e| CheckoutError::CheckoutCreationFailed(e.to_string()))?;

        tracing::debug!(preference_id = %created.id, "Created Mercado Pago preference");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        let response = self
            .http
            .get(self.url(&format!("/v1/payments/{payment_id}")))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| CheckoutError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Gateway(format!(
                "payment {payment_id} lookup failed ({status}): {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CheckoutError::Gateway(format!("payment {payment_id}: {e}")))
    }

    fn name(&self) -> &str {
        "MercadoPago"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MercadoPagoConfig::new("APP_USR-token", "secret");
        assert_eq!(config.api_base_url, "https://api.mercadopago.com");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = MercadoPagoConfig::new("APP_USR-token", "secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("APP_USR-token"));
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn test_url_join() {
        let mut config = MercadoPagoConfig::new("t", "s");
        config.api_base_url = "http://localhost:9000/".into();
        let client = MercadoPagoClient::new(config).unwrap();
        assert_eq!(client.url("/v1/payments/1"), "http://localhost:9000/v1/payments/1");
    }
}
