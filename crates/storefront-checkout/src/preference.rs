//! Payment Preference Builder
//!
//! Turns a cart snapshot plus purchaser data into the line-item / payer /
//! metadata structure the hosted-checkout gateway expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::OrderMetadata;
use crate::model::{CartSnapshot, Purchaser};

/// Line-item id used for the synthetic shipping line
pub const SHIPPING_ITEM_ID: &str = "shipping";

/// Payer identification scheme (Brazilian individual taxpayer number)
pub const IDENTIFICATION_TYPE: &str = "CPF";

/// Redirect destinations after the hosted payment page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

impl BackUrls {
    /// Standard `/checkout/{success,failure,pending}` pages under `base_url`
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success: format!("{base}/checkout/success"),
            failure: format!("{base}/checkout/failure"),
            pending: format!("{base}/checkout/pending"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: u32,
    pub currency_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerAddress {
    pub zip_code: String,
    pub street_name: String,
    pub street_number: String,
    pub neighborhood: String,
    pub city: String,
    pub federal_unit: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub area_code: String,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub email: String,
    pub identification: Identification,
    pub address: PayerAddress,
    pub phone: Phone,
}

/// Gateway-ready preference (never persisted)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPreference {
    pub items: Vec<PreferenceItem>,
    pub payer: Payer,
    pub back_urls: BackUrls,
    pub auto_return: String,
    pub external_reference: String,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentPreference {
    /// Build a preference for `cart` paid by `purchaser`
    ///
    /// One item per product plus one shipping item; the item sum equals the
    /// metadata total.
    pub fn build(
        purchaser: &Purchaser,
        cart: &CartSnapshot,
        back_urls: BackUrls,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let shipping = cart.shipping();

        let items = cart
            .products()
            .iter()
            .map(|product| PreferenceItem {
                id: product.id.clone(),
                title: product.name.clone(),
                unit_price: product.price,
                quantity: product.quantity,
                currency_id: "BRL".into(),
            })
            .chain(std::iter::once(PreferenceItem {
                id: SHIPPING_ITEM_ID.into(),
                title: format!("Frete - {}", shipping.name),
                unit_price: shipping.price,
                quantity: 1,
                currency_id: "BRL".into(),
            }))
            .collect();

        let address = &purchaser.address;
        let payer = Payer {
            name: purchaser.name.clone(),
            email: purchaser.email.clone(),
            identification: Identification {
                kind: IDENTIFICATION_TYPE.into(),
                number: digits(&purchaser.tax_id),
            },
            address: PayerAddress {
                zip_code: address.cep.clone(),
                street_name: address.street.clone(),
                street_number: address.number.clone(),
                neighborhood: address.neighborhood.clone(),
                city: address.city.clone(),
                federal_unit: address.state.clone(),
            },
            phone: split_phone(&purchaser.phone),
        };

        let metadata = OrderMetadata::new(purchaser, cart).encode()?;

        Ok(Self {
            items,
            payer,
            back_urls,
            auto_return: "approved".into(),
            external_reference: order_reference(now),
            metadata,
        })
    }

    /// `sum(unit_price * quantity)` over every item, shipping included
    pub fn items_total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }
}

/// Timestamp-based order tag; unique only as far as millisecond clocks are
pub fn order_reference(now: DateTime<Utc>) -> String {
    format!("ORDER-{}", now.timestamp_millis())
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// First two digits are the area code, the remaining digits the number
fn split_phone(phone: &str) -> Phone {
    let all = digits(phone);
    let split = all.len().min(2);
    let (area_code, number) = all.split_at(split);
    Phone {
        area_code: area_code.to_string(),
        number: number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::OrderMetadata;
    use crate::model::{Address, CartItem, ShippingOption};
    use rust_decimal_macros::dec;

    fn purchaser() -> Purchaser {
        Purchaser {
            name: "João Silva".into(),
            email: "joao@exemplo.com".into(),
            tax_id: "123.456.789-00".into(),
            phone: "(11) 99999-8888".into(),
            address: Address {
                cep: "01234-567".into(),
                street: "Rua Teste".into(),
                number: "123".into(),
                complement: Some("Apto 4".into()),
                neighborhood: "Centro".into(),
                city: "São Paulo".into(),
                state: "SP".into(),
            },
        }
    }

    fn cart() -> CartSnapshot {
        CartSnapshot::new(
            vec![CartItem::new("p1", "Peça Teste 1", dec!(150.50), 2)],
            Some(ShippingOption::new("Frete Expresso", dec!(45.90), Some(3))),
        )
        .unwrap()
    }

    fn build() -> PaymentPreference {
        PaymentPreference::build(
            &purchaser(),
            &cart(),
            BackUrls::from_base("https://loja.example.com/"),
            DateTime::from_timestamp_millis(1_714_564_800_000).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_items_include_shipping_line() {
        let pref = build();
        assert_eq!(pref.items.len(), 2);

        let shipping = &pref.items[1];
        assert_eq!(shipping.id, "shipping");
        assert_eq!(shipping.title, "Frete - Frete Expresso");
        assert_eq!(shipping.quantity, 1);
        assert_eq!(shipping.unit_price, dec!(45.90));

        assert_eq!(pref.items[0].unit_price, dec!(150.50));
        assert_eq!(pref.items[0].quantity, 2);
    }

    #[test]
    fn test_items_total_matches_metadata_total() {
        let pref = build();
        assert_eq!(pref.items_total(), dec!(346.90));
        assert_eq!(pref.metadata["total"], "346.90");
    }

    #[test]
    fn test_payer_normalization() {
        let pref = build();
        assert_eq!(pref.payer.identification.kind, "CPF");
        assert_eq!(pref.payer.identification.number, "12345678900");
        assert_eq!(pref.payer.phone.area_code, "11");
        assert_eq!(pref.payer.phone.number, "999998888");
        assert_eq!(pref.payer.address.federal_unit, "SP");
    }

    #[test]
    fn test_short_phone_does_not_panic() {
        assert_eq!(split_phone("1").area_code, "1");
        assert_eq!(split_phone("").number, "");
    }

    #[test]
    fn test_callbacks_and_reference() {
        let pref = build();
        assert_eq!(pref.back_urls.success, "https://loja.example.com/checkout/success");
        assert_eq!(pref.back_urls.failure, "https://loja.example.com/checkout/failure");
        assert_eq!(pref.back_urls.pending, "https://loja.example.com/checkout/pending");
        assert_eq!(pref.auto_return, "approved");
        assert_eq!(pref.external_reference, "ORDER-1714564800000");
    }

    #[test]
    fn test_gateway_json_shape() {
        let json = serde_json::to_value(build()).unwrap();
        assert_eq!(json["items"][0]["unit_price"], serde_json::json!(150.5));
        assert_eq!(json["payer"]["identification"]["type"], "CPF");
        assert!(json["metadata"]["products"].is_string());
    }

    #[test]
    fn test_metadata_decodes_back() {
        let pref = build();
        let echoed = pref
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let order = OrderMetadata::decode(&echoed)
            .unwrap()
            .into_order_details()
            .unwrap();
        assert_eq!(order.total, pref.items_total());
        assert_eq!(order.address.complement.as_deref(), Some("Apto 4"));
    }
}
