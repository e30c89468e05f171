//! Retrieval tool client (JSON-RPC 2.0).
//!
//! Wraps the per-shop tool service behind typed wrappers. Every wrapper is
//! best-effort: any transport, protocol, or shape failure logs a warning and
//! yields `None`, never an error. Only HTTP 429 is retried.

pub mod client;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use client::ToolClient;
pub use error::ToolError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockToolBackend;
pub use types::{CartLine, CartSnapshot, CatalogProduct, OrderSummary, PolicyAnswer};

use async_trait::async_trait;
use serde_json::json;

/// The retrieval operations the gateway orchestrates. Implemented by
/// [`ToolClient`] in production and by [`mock::MockToolBackend`] in tests.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn catalog_search(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Option<Vec<CatalogProduct>>;

    async fn search_policies(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Option<Vec<PolicyAnswer>>;

    async fn get_cart(&self, cart_id: &str) -> Option<CartSnapshot>;

    /// Replaces quantities for the given lines; a `quantity` of 0 removes the
    /// line upstream. `cart_id` of `None` asks the service to mint a cart.
    async fn update_cart(&self, cart_id: Option<&str>, lines: &[CartLine])
    -> Option<CartSnapshot>;

    async fn order_status(&self, order_id: &str) -> Option<OrderSummary>;

    async fn recent_order_status(&self) -> Option<OrderSummary>;
}

#[async_trait]
impl ToolBackend for ToolClient {
    async fn catalog_search(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Option<Vec<CatalogProduct>> {
        let result = self
            .call_opt(
                "search_shop_catalog",
                json!({ "query": query, "context": context }),
            )
            .await?;

        let products = result.get("products")?.as_array()?;
        Some(
            products
                .iter()
                .filter_map(CatalogProduct::from_value)
                .collect(),
        )
    }

    async fn search_policies(
        &self,
        query: &str,
        context: Option<&str>,
    ) -> Option<Vec<PolicyAnswer>> {
        let result = self
            .call_opt(
                "search_shop_policies_and_faqs",
                json!({ "query": query, "context": context }),
            )
            .await?;

        // Answers arrive under either key depending on the service version.
        let answers = result
            .get("policies")
            .or_else(|| result.get("results"))?
            .as_array()?;
        Some(answers.iter().filter_map(PolicyAnswer::from_value).collect())
    }

    async fn get_cart(&self, cart_id: &str) -> Option<CartSnapshot> {
        let result = self.call_opt("get_cart", json!({ "cartId": cart_id })).await?;
        CartSnapshot::from_value(&result)
    }

    async fn update_cart(
        &self,
        cart_id: Option<&str>,
        lines: &[CartLine],
    ) -> Option<CartSnapshot> {
        let result = self
            .call_opt(
                "update_cart",
                json!({ "cartId": cart_id, "lines": lines }),
            )
            .await?;
        CartSnapshot::from_value(&result)
    }

    async fn order_status(&self, order_id: &str) -> Option<OrderSummary> {
        let result = self
            .call_opt("get_order_status", json!({ "orderId": order_id }))
            .await?;
        OrderSummary::from_value(&result)
    }

    async fn recent_order_status(&self) -> Option<OrderSummary> {
        let result = self
            .call_opt("get_most_recent_order_status", json!({}))
            .await?;
        OrderSummary::from_value(&result)
    }
}
