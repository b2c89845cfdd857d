//! Resend Email Provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Mailer;
use super::templates::{self, RenderedEmail};
use crate::error::{CheckoutError, Result};
use crate::model::OrderDetails;

/// Resend client configuration
#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: String,

    /// Sender, e.g. `Spazio Parts <noreply@spazioparts.com>`
    pub from: String,

    /// Store operator mailbox for sale notices
    pub owner_address: String,

    pub api_base_url: String,

    pub timeout_secs: u64,
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .field("owner_address", &self.owner_address)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ResendConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.resend.com";

    pub fn new(
        api_key: impl Into<String>,
        from: impl Into<String>,
        owner_address: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            owner_address: owner_address.into(),
            api_base_url: Self::DEFAULT_API_URL.into(),
            timeout_secs: 15,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("RESEND_API_KEY")
            .map_err(|_| CheckoutError::Config("RESEND_API_KEY not set".into()))?;
        let from = std::env::var("MAIL_FROM")
            .map_err(|_| CheckoutError::Config("MAIL_FROM not set".into()))?;
        let owner_address = std::env::var("MAIL_OWNER_ADDRESS")
            .map_err(|_| CheckoutError::Config("MAIL_OWNER_ADDRESS not set".into()))?;

        let mut config = Self::new(api_key, from, owner_address);
        if let Ok(url) = std::env::var("RESEND_API_URL") {
            config.api_base_url = url;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: Vec<String>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Mailer backed by the Resend HTTP API
pub struct ResendMailer {
    http: Client,
    config: ResendConfig,
}

impl ResendMailer {
    pub fn new(config: ResendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ResendConfig::from_env()?)
    }

    async fn send(&self, to: String, email: RenderedEmail) -> Result<String> {
        let url = format!("{}/emails", self.config.api_base_url.trim_end_matches('/'));
        let body = SendEmail {
            from: &self.config.from,
            to: vec![to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckoutError::EmailDispatchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CheckoutError::EmailDispatchFailed(format!(
                "provider rejected message ({status}): {detail}"
            )));
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::EmailDispatchFailed(e.to_string()))?;
        Ok(sent.id)
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[tracing::instrument(skip(self, order))]
    async fn send_order_confirmation(&self, order: &OrderDetails) -> Result<()> {
        let id = self.send(recipient(&order.name, &order.email), templates::order_confirmation(order)).await?;
        tracing::info!(message_id = %id, "Sent order confirmation");
        Ok(())
    }

    #[tracing::instrument(skip(self, order))]
    async fn send_owner_notification(&self, order: &OrderDetails) -> Result<()> {
        let to = self.config.owner_address.clone();
        let id = self.send(to, templates::owner_notification(order)).await?;
        tracing::info!(message_id = %id, "Sent owner notification");
        Ok(())
    }

    fn name(&self) -> &str {
        "Resend"
    }
}

/// `"Display Name" <address>`, quoted so commas or angle brackets in the
/// buyer's name cannot break the address list
fn recipient(name: &str, email: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.trim().chars().filter(|c| !c.is_control()) {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }

    if quoted.is_empty() {
        email.to_string()
    } else {
        format!("\"{quoted}\" <{email}>")
    }
}
