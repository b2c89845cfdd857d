//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use storefront_checkout::{
    Address, CartItem, CartSubmission, CheckoutError, CheckoutId, CheckoutLink, CheckoutRequest,
    CheckoutView, OrderDetails, PackageDimensions, ShippingOption, ShippingQuote, SignatureInput,
    WebhookNotification, WebhookOutcome,
};

use crate::state::{AppState, Payments};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
    pub mail_configured: bool,
    pub shipping_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub checkout_id: CheckoutId,
}

#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ShippingRequest {
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub product: Option<PackageDimensions>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Map a pipeline error to its HTTP status and `{error, code}` body
fn from_checkout_error(e: &CheckoutError) -> ApiError {
    let status = match e {
        CheckoutError::InvalidCheckoutData(_) | CheckoutError::WebhookParse(_) => {
            StatusCode::BAD_REQUEST
        }
        CheckoutError::NotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::Expired(_) => StatusCode::GONE,
        CheckoutError::WebhookVerificationFailed => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %e, code = e.code(), "Request failed");
    }

    api_error(status, e.user_message(), e.code())
}

fn payments_disabled() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Payments not configured",
        "PAYMENTS_DISABLED",
    )
}

fn payments(state: &AppState) -> Result<&Payments, ApiError> {
    state.payments.as_ref().ok_or_else(payments_disabled)
}

fn invalid_body(rejection: &JsonRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid checkout data: {}", rejection.body_text()),
        CheckoutError::InvalidCheckoutData(String::new()).code(),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.payments.is_some(),
        mail_configured: state.mail_configured,
        shipping_configured: state.shipping.is_some(),
    })
}

/// Open a checkout session for a cart
pub async fn init_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CartSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<InitResponse>), ApiError> {
    let Json(submission) = payload.map_err(|e| invalid_body(&e))?;

    let session = state
        .sessions
        .init(submission)
        .await
        .map_err(|e| from_checkout_error(&e))?;

    Ok((
        StatusCode::CREATED,
        Json(InitResponse {
            checkout_id: session.id,
        }),
    ))
}

/// Read a checkout session's cart and server-side total
pub async fn get_checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutView>, ApiError> {
    state
        .sessions
        .read(&CheckoutId::from_string(id))
        .await
        .map(Json)
        .map_err(|e| from_checkout_error(&e))
}

/// Create the hosted payment page for a session
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutLink>, ApiError> {
    let payments = payments(&state)?;
    let Json(request) = payload.map_err(|e| invalid_body(&e))?;

    payments
        .checkout
        .create_checkout(request)
        .await
        .map(Json)
        .map_err(|e| from_checkout_error(&e))
}

/// Gateway payment notifications
///
/// The signature is checked against the query string and headers before the
/// body is parsed. Failures after a confirmed payment has been claimed are
/// acknowledged so the gateway does not redeliver endlessly.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReceivedResponse>, ApiError> {
    let payments = payments(&state)?;

    let data_id = query.get("data.id").map(String::as_str);
    let input = SignatureInput {
        signature: header(&headers, "x-signature"),
        request_id: header(&headers, "x-request-id"),
        data_id,
    };
    payments
        .verifier
        .verify(&input)
        .map_err(|e| from_checkout_error(&e))?;

    let notification = WebhookNotification::parse(&body).map_err(|e| from_checkout_error(&e))?;

    // The signature covers the query id, so the body must agree with it
    if let Some(body_id) = notification.data.as_ref().and_then(|d| d.id.as_deref()) {
        if data_id.is_none_or(|signed| !signed.eq_ignore_ascii_case(body_id)) {
            tracing::warn!(body_id, signed_id = ?data_id, "Webhook id does not match signed id");
            return Err(from_checkout_error(&CheckoutError::WebhookVerificationFailed));
        }
    }

    match payments.reconciler.handle(&notification).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Notified { payment_id } => {
                    tracing::info!(payment_id, "Payment confirmed and notified");
                }
                WebhookOutcome::Duplicate { payment_id } => {
                    tracing::info!(payment_id, "Duplicate payment notification");
                }
                other => tracing::debug!(outcome = ?other, "Webhook handled"),
            }
            Ok(Json(ReceivedResponse { received: true }))
        }
        Err(e @ (CheckoutError::InvalidOrderMetadata(_) | CheckoutError::EmailDispatchFailed(_))) => {
            tracing::error!(error = %e, code = e.code(), "Confirmed payment could not be notified");
            Ok(Json(ReceivedResponse { received: true }))
        }
        Err(e) => Err(from_checkout_error(&e)),
    }
}

/// Carrier quotes for one package
pub async fn quote_shipping(
    State(state): State<AppState>,
    payload: Result<Json<ShippingRequest>, JsonRejection>,
) -> Result<Json<Vec<ShippingQuote>>, ApiError> {
    let quoter = state.shipping.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Shipping quotes not configured",
            "SHIPPING_DISABLED",
        )
    })?;

    let Json(request) = payload.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, e.body_text(), "INVALID_SHIPPING_REQUEST")
    })?;

    let cep = request
        .cep
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "CEP is required", "INVALID_SHIPPING_REQUEST"))?;
    let product = request.product.ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "Product dimensions are required",
            "INVALID_SHIPPING_REQUEST",
        )
    })?;

    quoter
        .quote(cep.trim(), &product)
        .await
        .map(Json)
        .map_err(|e| from_checkout_error(&e))
}

/// Send both order emails for a fixed sample order (development only)
pub async fn test_email(State(state): State<AppState>) -> Result<Json<SuccessResponse>, ApiError> {
    if state.environment.is_production() {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "Not available in production",
            "FORBIDDEN",
        ));
    }

    let order = sample_order();
    let sent = async {
        state.mailer.send_order_confirmation(&order).await?;
        state.mailer.send_owner_notification(&order).await
    }
    .await;

    sent.map_err(|e| from_checkout_error(&e))?;
    tracing::info!(mailer = state.mailer.name(), to = %order.email, "Sent test emails");

    Ok(Json(SuccessResponse { success: true }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn sample_order() -> OrderDetails {
    OrderDetails {
        name: "João Silva".into(),
        email: "joao.silva@exemplo.com".into(),
        phone: "(11) 99999-9999".into(),
        tax_id: "12345678900".into(),
        products: vec![
            CartItem::new("test-1", "Peça Teste 1", dec!(150.50), 2),
            CartItem::new("test-2", "Peça Teste 2", dec!(299.90), 1),
        ],
        shipping: ShippingOption::new("Frete Expresso", dec!(45.90), Some(3)),
        total: dec!(646.80),
        address: Address {
            cep: "01234-567".into(),
            street: "Rua Teste".into(),
            number: "123".into(),
            complement: None,
            neighborhood: "Centro".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
        },
    }
}
