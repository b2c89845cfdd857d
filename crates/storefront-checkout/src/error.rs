//! Checkout Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout pipeline errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Cart snapshot or purchaser data rejected (empty cart, missing shipping, ...)
    #[error("Invalid checkout data: {0}")]
    InvalidCheckoutData(String),

    /// No session stored under this id
    #[error("Checkout not found: {0}")]
    NotFound(String),

    /// Session existed but its TTL has elapsed
    #[error("Checkout expired: {0}")]
    Expired(String),

    /// Gateway refused or failed to create the payment preference
    #[error("Checkout creation failed: {0}")]
    CheckoutCreationFailed(String),

    /// Webhook signature missing or invalid
    #[error("Webhook signature invalid")]
    WebhookVerificationFailed,

    /// Webhook body could not be parsed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Gateway call other than preference creation failed
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Metadata echoed back by the gateway is missing or malformed
    #[error("Invalid order metadata: {0}")]
    InvalidOrderMetadata(String),

    /// Confirmation or owner email could not be sent
    #[error("Email dispatch failed: {0}")]
    EmailDispatchFailed(String),

    /// Carrier quote request failed
    #[error("Shipping quote failed: {0}")]
    ShippingQuoteFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Gateway(_)
                | Self::CheckoutCreationFailed(_)
                | Self::EmailDispatchFailed(_)
                | Self::ShippingQuoteFailed(_)
                | Self::Storage(_)
        )
    }

    /// Stable machine-readable code, used in HTTP error bodies
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCheckoutData(_) => "INVALID_CHECKOUT_DATA",
            Self::NotFound(_) => "CHECKOUT_NOT_FOUND",
            Self::Expired(_) => "CHECKOUT_EXPIRED",
            Self::CheckoutCreationFailed(_) => "CHECKOUT_CREATION_FAILED",
            Self::WebhookVerificationFailed => "WEBHOOK_VERIFICATION_FAILED",
            Self::WebhookParse(_) => "WEBHOOK_PARSE_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::InvalidOrderMetadata(_) => "INVALID_ORDER_METADATA",
            Self::EmailDispatchFailed(_) => "EMAIL_DISPATCH_FAILED",
            Self::ShippingQuoteFailed(_) => "SHIPPING_QUOTE_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCheckoutData(msg) => format!("Invalid checkout data: {msg}"),
            Self::NotFound(_) => "Checkout not found.".into(),
            Self::Expired(_) => "Checkout has expired. Please start again.".into(),
            Self::CheckoutCreationFailed(_) => {
                "Could not start the payment. Please try again.".into()
            }
            Self::WebhookVerificationFailed => "Invalid signature.".into(),
            Self::WebhookParse(_) => "Malformed notification.".into(),
            Self::ShippingQuoteFailed(_) => "Could not quote shipping.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}
