//! Hosted Checkout
//!
//! Resolves a checkout session, builds the payment preference and asks the
//! gateway for the hosted payment page the buyer is redirected to.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::gateway::{Environment, PaymentGateway};
use crate::model::Purchaser;
use crate::preference::{BackUrls, PaymentPreference};
use crate::session::{CheckoutId, CheckoutSessions};

/// Request to create a hosted checkout for a stored session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Session holding the cart
    pub checkout_id: CheckoutId,

    /// Buyer identity, contact and delivery address
    #[serde(flatten)]
    pub purchaser: Purchaser,
}

/// Where to send the buyer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub checkout_url: String,

    /// Gateway preference id
    pub preference_id: String,

    /// Order tag sent as `external_reference`
    pub order_reference: String,
}

/// Checkout orchestration: session reader -> preference builder -> gateway
#[derive(Clone)]
pub struct CheckoutService {
    sessions: CheckoutSessions,
    gateway: Arc<dyn PaymentGateway>,
    back_urls: BackUrls,
    environment: Environment,
}

impl CheckoutService {
    pub fn new(
        sessions: CheckoutSessions,
        gateway: Arc<dyn PaymentGateway>,
        back_urls: BackUrls,
        environment: Environment,
    ) -> Self {
        Self {
            sessions,
            gateway,
            back_urls,
            environment,
        }
    }

    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Create a hosted checkout for the session in `request`
    ///
    /// Session errors (`NotFound`, `Expired`) pass through; any gateway error
    /// becomes `CheckoutCreationFailed`. Nothing is retried here.
    #[tracing::instrument(skip(self, request), fields(checkout_id = %request.checkout_id))]
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutLink> {
        request.purchaser.validate()?;

        let cart = self.sessions.cart(&request.checkout_id).await?;

        let preference =
            PaymentPreference::build(&request.purchaser, &cart, self.back_urls.clone(), Utc::now())?;

        let created = self
            .gateway
            .create_preference(&preference)
            .await
            .map_err(|e| match e {
                CheckoutError::CheckoutCreationFailed(_) => e,
                other => CheckoutError::CheckoutCreationFailed(other.to_string()),
            })?;

        tracing::info!(
            gateway = self.gateway.name(),
            preference_id = %created.id,
            order_reference = %preference.external_reference,
            total = %cart.total(),
            "Created hosted checkout"
        );

        Ok(CheckoutLink {
            checkout_url: created.checkout_url(self.environment).to_string(),
            preference_id: created.id,
            order_reference: preference.external_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::model::{Address, CartItem, CartSubmission, ShippingOption};
    use crate::session::MemorySessionStore;
    use rust_decimal_macros::dec;

    fn purchaser() -> Purchaser {
        Purchaser {
            name: "Maria Souza".into(),
            email: "maria@exemplo.com".into(),
            tax_id: "98765432100".into(),
            phone: "21988887777".into(),
            address: Address {
                cep: "20000-000".into(),
                street: "Av. Atlântica".into(),
                number: "1000".into(),
                complement: None,
                neighborhood: "Copacabana".into(),
                city: "Rio de Janeiro".into(),
                state: "RJ".into(),
            },
        }
    }

    async fn setup(environment: Environment) -> (CheckoutService, Arc<MockGateway>, CheckoutId) {
        let sessions = CheckoutSessions::new(Arc::new(MemorySessionStore::new()));
        let session = sessions
            .init(CartSubmission {
                products: vec![CartItem::new("p1", "Radiador", dec!(420.00), 1)],
                shipping: Some(ShippingOption::new("SEDEX", dec!(38.50), Some(2))),
            })
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        let service = CheckoutService::new(
            sessions,
            gateway.clone(),
            BackUrls::from_base("http://localhost:3000"),
            environment,
        );
        (service, gateway, session.id)
    }

    #[tokio::test]
    async fn test_sandbox_url_in_development() {
        let (service, gateway, id) = setup(Environment::Development).await;

        let link = service
            .create_checkout(CheckoutRequest {
                checkout_id: id,
                purchaser: purchaser(),
            })
            .await
            .unwrap();

        assert!(link.checkout_url.starts_with("https://sandbox."));
        let sent = gateway.preferences().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].items_total(), dec!(458.50));
    }

    #[tokio::test]
    async fn test_live_url_in_production() {
        let (service, _, id) = setup(Environment::Production).await;
        let link = service
            .create_checkout(CheckoutRequest {
                checkout_id: id,
                purchaser: purchaser(),
            })
            .await
            .unwrap();
        assert!(link.checkout_url.starts_with("https://www."));
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces_as_creation_failed() {
        let (service, gateway, id) = setup(Environment::Development).await;
        gateway.fail_preferences(true);

        let err = service
            .create_checkout(CheckoutRequest {
                checkout_id: id,
                purchaser: purchaser(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CheckoutCreationFailed(_)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (service, gateway, _) = setup(Environment::Development).await;
        let err = service
            .create_checkout(CheckoutRequest {
                checkout_id: CheckoutId::from_string("missing"),
                purchaser: purchaser(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));
        assert!(gateway.preferences().await.is_empty());
    }

    #[test]
    fn test_request_parses_flat_body() {
        let json = r#"{"checkoutId":"abc","name":"Maria","email":"maria@exemplo.com",
                       "cpf":"98765432100","phone":"21988887777",
                       "address":{"cep":"20000-000","street":"Rua","number":"1",
                                  "neighborhood":"Centro","city":"Rio","state":"RJ"}}"#;
        let request: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.checkout_id.as_str(), "abc");
        assert_eq!(request.purchaser.tax_id, "98765432100");
    }
}
