//! Programmable tool backend for tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{CartLine, CartSnapshot, CatalogProduct, OrderSummary, PolicyAnswer};
use super::ToolBackend;

/// Records of mutate calls, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCartUpdate {
    pub cart_id: Option<String>,
    pub lines: Vec<CartLine>,
}

/// In-memory [`ToolBackend`] whose responses are set per test. Every field
/// defaults to `None`, matching an upstream that fails every call.
#[derive(Default)]
pub struct MockToolBackend {
    pub products: Mutex<Option<Vec<CatalogProduct>>>,
    pub policies: Mutex<Option<Vec<PolicyAnswer>>>,
    pub cart: Mutex<Option<CartSnapshot>>,
    pub updated_cart: Mutex<Option<CartSnapshot>>,
    pub order: Mutex<Option<OrderSummary>>,
    pub cart_updates: Mutex<Vec<RecordedCartUpdate>>,
    pub catalog_queries: Mutex<Vec<String>>,
}

impl MockToolBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<CatalogProduct>) -> Self {
        let mock = Self::default();
        *mock.products.lock() = Some(products);
        mock
    }

    pub fn with_policies(policies: Vec<PolicyAnswer>) -> Self {
        let mock = Self::default();
        *mock.policies.lock() = Some(policies);
        mock
    }

    pub fn recorded_updates(&self) -> Vec<RecordedCartUpdate> {
        self.cart_updates.lock().clone()
    }
}

#[async_trait]
impl ToolBackend for MockToolBackend {
    async fn catalog_search(
        &self,
        query: &str,
        _context: Option<&str>,
    ) -> Option<Vec<CatalogProduct>> {
        self.catalog_queries.lock().push(query.to_string());
        self.products.lock().clone()
    }

    async fn search_policies(
        &self,
        _query: &str,
        _context: Option<&str>,
    ) -> Option<Vec<PolicyAnswer>> {
        self.policies.lock().clone()
    }

    async fn get_cart(&self, _cart_id: &str) -> Option<CartSnapshot> {
        self.cart.lock().clone()
    }

    async fn update_cart(
        &self,
        cart_id: Option<&str>,
        lines: &[CartLine],
    ) -> Option<CartSnapshot> {
        self.cart_updates.lock().push(RecordedCartUpdate {
            cart_id: cart_id.map(str::to_string),
            lines: lines.to_vec(),
        });
        if lines.is_empty() {
            // Empty line sets leave the snapshot untouched.
            return self.cart.lock().clone();
        }
        self.updated_cart.lock().clone()
    }

    async fn order_status(&self, _order_id: &str) -> Option<OrderSummary> {
        self.order.lock().clone()
    }

    async fn recent_order_status(&self) -> Option<OrderSummary> {
        self.order.lock().clone()
    }
}
