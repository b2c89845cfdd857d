//! Shipping Quotes
//!
//! Carrier rate lookup for a single package shipped from the store's postal
//! code. The Melhor Envio calculator is the only carrier integration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CheckoutError, Result};

/// Package to quote; dimensions in cm, weight in kg
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub insurance_value: Decimal,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// One carrier option, passed through mostly as the carrier reports it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default)]
    pub name: String,

    /// Absent when the carrier cannot serve the route (see `error`)
    #[serde(default)]
    pub price: Option<String>,

    #[serde(default)]
    pub delivery_time: Option<u32>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub company: Option<Value>,
}

/// Shipping quote port
#[async_trait]
pub trait ShippingQuoter: Send + Sync {
    async fn quote(&self, destination_postal_code: &str, package: &PackageDimensions) -> Result<Vec<ShippingQuote>>;

    fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct MelhorEnvioConfig {
    pub token: String,

    /// Full calculator URL
    pub url: String,

    /// Origin postal code
    pub store_postal_code: String,

    /// Required by the API, `App Name (contact@email)`
    pub user_agent: String,

    pub timeout_secs: u64,
}

impl std::fmt::Debug for MelhorEnvioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelhorEnvioConfig")
            .field("token", &"[REDACTED]")
            .field("url", &self.url)
            .field("store_postal_code", &self.store_postal_code)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MelhorEnvioConfig {
    pub fn from_env() -> Result<Self> {
        let var = |key: &str| {
            std::env::var(key).map_err(|_| CheckoutError::Config(format!("{key} not set")))
        };

        Ok(Self {
            token: var("MELHOR_ENVIO_TOKEN")?,
            url: var("MELHOR_ENVIO_URL")?,
            store_postal_code: var("STORE_POSTAL_CODE")?,
            user_agent: var("MELHOR_ENVIO_USER_AGENT")?,
            timeout_secs: 15,
        })
    }
}

#[derive(Debug, Serialize)]
struct PostalCode<'a> {
    postal_code: &'a str,
}

#[derive(Debug, Serialize)]
struct QuoteProduct<'a> {
    id: &'a str,
    width: f64,
    height: f64,
    length: f64,
    weight: f64,
    #[serde(with = "rust_decimal::serde::float")]
    insurance_value: Decimal,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct QuoteRequest<'a> {
    from: PostalCode<'a>,
    to: PostalCode<'a>,
    products: Vec<QuoteProduct<'a>>,
    services: &'a str,
}

impl<'a> QuoteRequest<'a> {
    fn new(from: &'a str, to: &'a str, package: &PackageDimensions) -> Self {
        Self {
            from: PostalCode { postal_code: from },
            to: PostalCode { postal_code: to },
            products: vec![QuoteProduct {
                id: "x",
                width: package.width,
                height: package.height,
                length: package.length,
                weight: package.weight,
                insurance_value: package.insurance_value,
                quantity: package.quantity.unwrap_or(1),
            }],
            services: "3",
        }
    }
}

pub struct MelhorEnvioClient {
    http: Client,
    config: MelhorEnvioConfig,
}

impl MelhorEnvioClient {
    pub fn new(config: MelhorEnvioConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(MelhorEnvioConfig::from_env()?)
    }
}

#[async_trait]
impl ShippingQuoter for MelhorEnvioClient {
    #[tracing::instrument(skip(self, package))]
    async fn quote(&self, destination_postal_code: &str, package: &PackageDimensions) -> Result<Vec<ShippingQuote>> {
        let body = QuoteRequest::new(&self.config.store_postal_code, destination_postal_code, package);

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.config.user_agent)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckoutError::ShippingQuoteFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CheckoutError::ShippingQuoteFailed(format!(
                "carrier answered {status}: {detail}"
            )));
        }

        // A single-service request may come back as one object instead of a list
        let value: Value = response
            .json()
            .await
            .map_err(|e| CheckoutError::ShippingQuoteFailed(e.to_string()))?;
        let quotes = match value {
            Value::Array(_) => serde_json::from_value(value),
            other => serde_json::from_value(other).map(|q| vec![q]),
        }
        .map_err(|e| CheckoutError::ShippingQuoteFailed(format!("unexpected carrier response: {e}")))?;

        tracing::debug!(count = quotes.len(), "Received shipping quotes");
        Ok(quotes)
    }

    fn name(&self) -> &str {
        "MelhorEnvio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn package(quantity: Option<u32>) -> PackageDimensions {
        PackageDimensions {
            width: 11.0,
            height: 17.0,
            length: 11.0,
            weight: 0.3,
            insurance_value: dec!(10.10),
            quantity,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(QuoteRequest::new("01002001", "90570020", &package(None))).unwrap();
        assert_eq!(body["from"]["postal_code"], "01002001");
        assert_eq!(body["to"]["postal_code"], "90570020");
        assert_eq!(body["services"], "3");
        assert_eq!(body["products"][0]["id"], "x");
        assert_eq!(body["products"][0]["quantity"], 1);
        assert_eq!(body["products"][0]["insurance_value"], serde_json::json!(10.1));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = MelhorEnvioConfig {
            token: "me_secret_token".into(),
            url: "https://sandbox.melhorenvio.com.br/api/v2/me/shipment/calculate".into(),
            store_postal_code: "01002001".into(),
            user_agent: "Loja (contato@loja.com)".into(),
            timeout_secs: 15,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("me_secret_token"));
        assert!(debug.contains("01002001"));
    }

    #[test]
    fn test_explicit_quantity_kept() {
        let body = serde_json::to_value(QuoteRequest::new("a", "b", &package(Some(3)))).unwrap();
        assert_eq!(body["products"][0]["quantity"], 3);
    }

    #[test]
    fn test_quote_parse() {
        let json = r#"{"id":3,"name":".Package","price":"18.72","delivery_time":5,
                       "company":{"id":2,"name":"Jadlog"}}"#;
        let quote: ShippingQuote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.name, ".Package");
        assert_eq!(quote.price.as_deref(), Some("18.72"));
        assert_eq!(quote.delivery_time, Some(5));
    }
}
