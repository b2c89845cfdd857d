//! Order Metadata
//!
//! The gateway echoes a preference's metadata back with every payment, which
//! makes it the only durable record of an order once the checkout session has
//! expired. Gateway metadata values are strings, so nested structures travel
//! as JSON text and the total as a decimal string.
//!
//! Decoding is strict: a missing key, a non-string value, an unknown schema
//! version or malformed nested JSON is rejected rather than patched up.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CheckoutError, Result};
use crate::model::{Address, CartItem, CartSnapshot, OrderDetails, Purchaser, ShippingOption, is_valid_email};

/// Current metadata layout
pub const SCHEMA_VERSION: &str = "1";

const KEY_VERSION: &str = "schema_version";
const KEY_NAME: &str = "name";
const KEY_EMAIL: &str = "email";
const KEY_PHONE: &str = "phone";
const KEY_TAX_ID: &str = "tax_id";
const KEY_ADDRESS: &str = "address";
const KEY_PRODUCTS: &str = "products";
const KEY_SHIPPING: &str = "shipping";
const KEY_TOTAL: &str = "total";

/// Typed form of the order metadata bag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderMetadata {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
    pub address: Address,
    pub products: Vec<CartItem>,
    pub shipping: ShippingOption,
    pub total: Decimal,
}

impl OrderMetadata {
    /// Capture purchaser and cart at preference-creation time
    pub fn new(purchaser: &Purchaser, cart: &CartSnapshot) -> Self {
        Self {
            name: purchaser.name.clone(),
            email: purchaser.email.clone(),
            phone: purchaser.phone.clone(),
            tax_id: purchaser.tax_id.clone(),
            address: purchaser.address.clone(),
            products: cart.products().to_vec(),
            shipping: cart.shipping().clone(),
            total: cart.total(),
        }
    }

    /// Serialize to the gateway's string-valued bag
    pub fn encode(&self) -> Result<BTreeMap<String, String>> {
        let mut bag = BTreeMap::new();
        bag.insert(KEY_VERSION.into(), SCHEMA_VERSION.into());
        bag.insert(KEY_NAME.into(), self.name.clone());
        bag.insert(KEY_EMAIL.into(), self.email.clone());
        bag.insert(KEY_PHONE.into(), self.phone.clone());
        bag.insert(KEY_TAX_ID.into(), self.tax_id.clone());
        bag.insert(KEY_ADDRESS.into(), to_json(&self.address)?);
        bag.insert(KEY_PRODUCTS.into(), to_json(&self.products)?);
        bag.insert(KEY_SHIPPING.into(), to_json(&self.shipping)?);
        bag.insert(KEY_TOTAL.into(), self.total.to_string());
        Ok(bag)
    }

    /// Parse the bag echoed back by the gateway
    pub fn decode(bag: &Map<String, Value>) -> Result<Self> {
        let version = text(bag, KEY_VERSION)?;
        if version != SCHEMA_VERSION {
            return Err(invalid(format!("unsupported schema version {version:?}")));
        }

        let total = text(bag, KEY_TOTAL)?;
        let total = Decimal::from_str(total)
            .map_err(|e| invalid(format!("total {total:?} is not a decimal: {e}")))?;

        Ok(Self {
            name: text(bag, KEY_NAME)?.to_string(),
            email: text(bag, KEY_EMAIL)?.to_string(),
            phone: text(bag, KEY_PHONE)?.to_string(),
            tax_id: text(bag, KEY_TAX_ID)?.to_string(),
            address: nested(bag, KEY_ADDRESS)?,
            products: nested(bag, KEY_PRODUCTS)?,
            shipping: nested(bag, KEY_SHIPPING)?,
            total,
        })
    }

    /// Validate and convert into the order used for notifications
    pub fn into_order_details(self) -> Result<OrderDetails> {
        if !is_valid_email(&self.email) {
            return Err(invalid(format!("email {:?} is malformed", self.email)));
        }

        if self.products.is_empty() {
            return Err(invalid("order has no products".into()));
        }

        Ok(OrderDetails {
            name: self.name,
            email: self.email,
            phone: self.phone,
            tax_id: self.tax_id,
            products: self.products,
            shipping: self.shipping,
            total: self.total,
            address: self.address,
        })
    }
}

fn invalid(msg: String) -> CheckoutError {
    CheckoutError::InvalidOrderMetadata(msg)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| invalid(e.to_string()))
}

fn text<'a>(bag: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match bag.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(format!("{key} is not a string: {other}"))),
        None => Err(invalid(format!("{key} is missing"))),
    }
}

fn nested<T: DeserializeOwned>(bag: &Map<String, Value>, key: &str) -> Result<T> {
    let raw = text(bag, key)?;
    serde_json::from_str(raw).map_err(|e| invalid(format!("{key}: {e}")))
}
