//! Typed shapes produced by the tool wrappers.
//!
//! Upstream envelopes are schema-loose; every constructor here narrows a
//! `serde_json::Value` by field presence and degrades to `None` on anything
//! unexpected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A storefront catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    /// Display string, currency included upstream.
    pub price: String,
    pub url: String,
    pub image_url: String,
    pub description: String,
}

impl CatalogProduct {
    /// Narrows a loose product object; `name` is the only required field.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        Some(Self {
            id: string_field(value, &["id", "productId"]),
            name,
            price: string_field(value, &["price"]),
            url: string_field(value, &["url"]),
            image_url: string_field(value, &["image", "imageUrl"]),
            description: string_field(value, &["description"]),
        })
    }
}

/// A policy / FAQ answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAnswer {
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
}

impl PolicyAnswer {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            question: value.get("question")?.as_str()?.to_string(),
            answer: value.get("answer")?.as_str()?.to_string(),
            category: value
                .get("category")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// One cart line, both as mutation input and snapshot output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub merchandise_id: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CartLine {
    pub fn new(merchandise_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            merchandise_id: merchandise_id.into(),
            quantity,
            title: None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            merchandise_id: value.get("merchandiseId")?.as_str()?.to_string(),
            quantity: value.get("quantity")?.as_u64()? as u32,
            title: value.get("title").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// A cart snapshot owned by the upstream catalog service. The id is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub id: String,
    pub total: Option<String>,
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Accepts either a bare cart object or a `{cart: {...}}` wrapper.
    pub fn from_value(value: &Value) -> Option<Self> {
        let cart = value.get("cart").unwrap_or(value);
        let id = cart.get("id")?.as_str()?.to_string();
        Some(Self {
            id,
            total: cart
                .get("total")
                .or_else(|| cart.get("totalAmount"))
                .and_then(loose_string),
            checkout_url: cart
                .get("checkoutUrl")
                .and_then(Value::as_str)
                .map(str::to_string),
            lines: cart
                .get("lines")
                .and_then(Value::as_array)
                .map(|lines| lines.iter().filter_map(CartLine::from_value).collect())
                .unwrap_or_default(),
        })
    }
}

/// An order status summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub status: String,
    pub tracking_url: Option<String>,
    pub estimated_delivery: Option<String>,
}

impl OrderSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        let order = value.get("order").unwrap_or(value);
        Some(Self {
            id: string_field(order, &["id", "orderId", "name"]),
            status: order.get("status")?.as_str()?.to_string(),
            tracking_url: order
                .get("trackingUrl")
                .and_then(Value::as_str)
                .map(str::to_string),
            estimated_delivery: order
                .get("estimatedDelivery")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// First present key wins; missing or non-string fields become empty.
fn string_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| value.get(key).and_then(loose_string))
        .unwrap_or_default()
}

/// Upstream sometimes sends numbers where a display string is expected.
fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
