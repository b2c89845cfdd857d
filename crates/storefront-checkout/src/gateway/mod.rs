//! Payment Gateway Integration
//!
//! Abstraction over the hosted-checkout payment gateway, with a Mercado Pago
//! HTTP implementation and an in-process mock.

mod mercado_pago;
pub mod mock;

pub use mercado_pago::{MercadoPagoClient, MercadoPagoConfig};
pub use mock::MockGateway;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::preference::PaymentPreference;

/// Which checkout URL the buyer is sent to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Sandbox checkout, test credentials
    #[default]
    Development,
    /// Live checkout
    Production,
}

impl Environment {
    /// Parse `APP_ENV`-style values; anything but production is development
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Gateway response to a preference creation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceCreated {
    /// Gateway preference id
    pub id: String,

    /// Live hosted-checkout URL
    pub init_point: String,

    /// Sandbox hosted-checkout URL
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

impl PreferenceCreated {
    /// Pick the redirect URL for the environment
    ///
    /// Falls back to the live URL when the gateway returned no sandbox URL.
    pub fn checkout_url(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.init_point,
            Environment::Development => self
                .sandbox_init_point
                .as_deref()
                .unwrap_or(&self.init_point),
        }
    }
}

/// Gateway payment status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Pending,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

/// Full payment details, fetched by id after a notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    pub status: PaymentStatus,

    /// Set once the payment is approved; instant transfers may report
    /// approval only through this field
    #[serde(default)]
    pub date_approved: Option<String>,

    /// Metadata bag from the originating preference
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PaymentDetails {
    /// Whether this payment represents a confirmed sale
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Approved || self.date_approved.is_some()
    }
}

/// Payment gateway trait (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-checkout preference
    async fn create_preference(&self, preference: &PaymentPreference) -> Result<PreferenceCreated>;

    /// Fetch full payment details by gateway id
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Accept an id sent either as a JSON string or a JSON number
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: PaymentStatus, date_approved: Option<&str>) -> PaymentDetails {
        PaymentDetails {
            id: "1".into(),
            status,
            date_approved: date_approved.map(String::from),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_confirmation_predicate() {
        assert!(payment(PaymentStatus::Approved, None).is_confirmed());
        assert!(payment(PaymentStatus::Approved, Some("2024-05-01T10:00:00.000-03:00")).is_confirmed());
        assert!(payment(PaymentStatus::Pending, Some("2024-05-01T10:00:00.000-03:00")).is_confirmed());
        assert!(!payment(PaymentStatus::Pending, None).is_confirmed());
        assert!(!payment(PaymentStatus::Rejected, None).is_confirmed());
    }

    #[test]
    fn test_payment_details_parse() {
        let json = r#"{"id": 123456789, "status": "approved", "date_approved": null,
                       "metadata": {"name": "João"}, "transaction_amount": 346.9}"#;
        let details: PaymentDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.id, "123456789");
        assert_eq!(details.status, PaymentStatus::Approved);
        assert_eq!(details.date_approved, None);
        assert_eq!(details.metadata["name"], "João");

        let odd: PaymentDetails = serde_json::from_str(r#"{"id":"x","status":"brand_new"}"#).unwrap();
        assert_eq!(odd.status, PaymentStatus::Unknown);
    }

    #[test]
    fn test_checkout_url_per_environment() {
        let created = PreferenceCreated {
            id: "pref".into(),
            init_point: "https://live".into(),
            sandbox_init_point: Some("https://sandbox".into()),
        };
        assert_eq!(created.checkout_url(Environment::Production), "https://live");
        assert_eq!(created.checkout_url(Environment::Development), "https://sandbox");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }
}
