//! Domain Models
//!
//! Cart snapshots, purchaser data and the reconstructed order.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// One product line of a cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog product id
    pub id: String,

    /// Product name as shown to the buyer
    pub name: String,

    /// Unit price in BRL
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,

    /// Units ordered
    pub quantity: u32,
}

impl CartItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
        }
    }

    /// `price * quantity`, unrounded
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Carrier service selected by the buyer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    /// Carrier/service name (e.g. "SEDEX")
    pub name: String,

    /// Shipping price in BRL
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,

    /// Delivery estimate in business days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
}

impl ShippingOption {
    pub fn new(name: impl Into<String>, price: Decimal, estimated_days: Option<u32>) -> Self {
        Self {
            name: name.into(),
            price,
            estimated_days,
        }
    }
}

/// Unvalidated cart as posted by the browser
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CartSubmission {
    #[serde(default)]
    pub products: Vec<CartItem>,

    #[serde(default)]
    pub shipping: Option<ShippingOption>,
}

/// Validated, immutable cart contents captured at checkout time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CartSubmission")]
pub struct CartSnapshot {
    products: Vec<CartItem>,
    shipping: ShippingOption,
}

impl CartSnapshot {
    /// Validate and build a snapshot
    ///
    /// At least one product line and a shipping selection are required;
    /// quantities must be positive and prices non-negative.
    pub fn new(products: Vec<CartItem>, shipping: Option<ShippingOption>) -> Result<Self> {
        if products.is_empty() {
            return Err(CheckoutError::InvalidCheckoutData(
                "cart has no products".into(),
            ));
        }

        let shipping = shipping.ok_or_else(|| {
            CheckoutError::InvalidCheckoutData("no shipping option selected".into())
        })?;

        if let Some(item) = products.iter().find(|p| p.quantity == 0) {
            return Err(CheckoutError::InvalidCheckoutData(format!(
                "product {} has zero quantity",
                item.id
            )));
        }

        if let Some(item) = products.iter().find(|p| p.price.is_sign_negative()) {
            return Err(CheckoutError::InvalidCheckoutData(format!(
                "product {} has a negative price",
                item.id
            )));
        }

        if shipping.price.is_sign_negative() {
            return Err(CheckoutError::InvalidCheckoutData(
                "shipping price is negative".into(),
            ));
        }

        Ok(Self { products, shipping })
    }

    pub fn products(&self) -> &[CartItem] {
        &self.products
    }

    pub const fn shipping(&self) -> &ShippingOption {
        &self.shipping
    }

    /// Sum of the product lines, without shipping
    pub fn items_subtotal(&self) -> Decimal {
        self.products.iter().map(CartItem::subtotal).sum()
    }

    /// Order total: `sum(price * quantity) + shipping.price`
    ///
    /// Exact decimal arithmetic; rounding is left to presentation.
    pub fn total(&self) -> Decimal {
        self.items_subtotal() + self.shipping.price
    }
}

impl TryFrom<CartSubmission> for CartSnapshot {
    type Error = CheckoutError;

    fn try_from(submission: CartSubmission) -> Result<Self> {
        Self::new(submission.products, submission.shipping)
    }
}

/// Delivery address (Brazilian format)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Postal code (CEP)
    pub cep: String,
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    /// Federal unit, e.g. "SP"
    pub state: String,
}

/// Buyer identity and contact data supplied on the checkout form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchaser {
    pub name: String,
    pub email: String,

    /// CPF, formatted or digits only
    #[serde(alias = "cpf")]
    pub tax_id: String,

    /// Phone with area code, e.g. "11999999999"
    pub phone: String,

    pub address: Address,
}

impl Purchaser {
    /// Checks the fields the payment gateway cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CheckoutError::InvalidCheckoutData("name is required".into()));
        }
        if !is_valid_email(&self.email) {
            return Err(CheckoutError::InvalidCheckoutData("email is malformed".into()));
        }
        Ok(())
    }
}

/// Order reconstructed from gateway metadata after a confirmed payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
    pub products: Vec<CartItem>,
    pub shipping: ShippingOption,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
    pub address: Address,
}

impl OrderDetails {
    /// Recomputed `sum(price * quantity) + shipping.price`
    pub fn computed_total(&self) -> Decimal {
        self.products.iter().map(CartItem::subtotal).sum::<Decimal>() + self.shipping.price
    }
}

/// Basic `local@domain.tld` shape check; no whitespace, a single `@`
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let len = domain.len();
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < len)
}
