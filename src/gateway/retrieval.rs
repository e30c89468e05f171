//! Retrieval strategy execution.
//!
//! Turns the router's strategy into tool and index calls and formats the
//! results as context documents. Every path is best-effort: a dead upstream
//! produces an empty outcome, never an error.

use serde_json::json;
use tracing::{debug, warn};

use super::state::AppState;
use crate::intent::RetrievalStrategy;
use crate::semantic::{RetrievedDocument, has_high_confidence_results};
use crate::session::SessionHandle;
use crate::tools::{CartLine, CartSnapshot, OrderSummary};

/// Context gathered for one turn.
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    pub documents: Vec<RetrievedDocument>,
}

pub async fn run_strategy(
    state: &AppState,
    session: &SessionHandle,
    strategy: RetrievalStrategy,
    query: &str,
) -> RetrievalOutcome {
    match strategy {
        RetrievalStrategy::CatalogSearch => catalog_search(state, query).await,
        RetrievalStrategy::CartView => cart_view(state, session).await,
        RetrievalStrategy::CartMutate {
            merchandise_id,
            quantity,
        } => cart_mutate(state, session, merchandise_id, quantity).await,
        RetrievalStrategy::OrderStatus { order_id } => order_status(state, order_id).await,
        RetrievalStrategy::PolicySearch => policy_search(state, query).await,
        RetrievalStrategy::None => RetrievalOutcome::default(),
    }
}

async fn catalog_search(state: &AppState, query: &str) -> RetrievalOutcome {
    let Some(tools) = &state.tools else {
        return RetrievalOutcome::default();
    };

    let Some(products) = tools.catalog_search(query, None).await else {
        debug!("catalog search returned nothing, continuing without context");
        return RetrievalOutcome::default();
    };

    let documents = products
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let id = if p.id.is_empty() {
                format!("product-{i}")
            } else {
                format!("product-{}", p.id)
            };
            let mut text = format!("{} | price {}", p.name, p.price);
            if !p.url.is_empty() {
                text.push_str(&format!(" | {}", p.url));
            }
            if !p.description.is_empty() {
                text.push_str(&format!(" | {}", p.description));
            }
            RetrievedDocument::new(id, text, 1.0)
        })
        .collect();

    RetrievalOutcome { documents }
}

async fn cart_view(state: &AppState, session: &SessionHandle) -> RetrievalOutcome {
    let Some(tools) = &state.tools else {
        return RetrievalOutcome::default();
    };
    let Ok(Some(cart_id)) = session.cart_id().await else {
        debug!("no cart reference for session, skipping cart retrieval");
        return RetrievalOutcome::default();
    };

    match tools.get_cart(&cart_id).await {
        Some(cart) => RetrievalOutcome {
            documents: vec![cart_document(&cart)],
        },
        None => RetrievalOutcome::default(),
    }
}

async fn cart_mutate(
    state: &AppState,
    session: &SessionHandle,
    merchandise_id: String,
    quantity: u32,
) -> RetrievalOutcome {
    let Some(tools) = &state.tools else {
        return RetrievalOutcome::default();
    };

    let cart_id = session.cart_id().await.ok().flatten();
    let lines = vec![CartLine::new(merchandise_id.clone(), quantity)];

    let Some(cart) = tools.update_cart(cart_id.as_deref(), &lines).await else {
        warn!("cart mutation failed upstream, continuing without context");
        return RetrievalOutcome::default();
    };

    // The server-resolved cart id overwrites the client-supplied one.
    if let Err(e) = session.set_cart_id(cart.id.as_str()).await {
        warn!(error = %e, "failed to record resolved cart id");
    }

    let action = if quantity == 0 { "remove" } else { "add" };
    let details = json!({ "merchandiseId": merchandise_id, "quantity": quantity });
    if let Err(e) = session.log_cart_action(action, details).await {
        warn!(error = %e, "failed to log cart action");
    }

    RetrievalOutcome {
        documents: vec![cart_document(&cart)],
    }
}

async fn order_status(state: &AppState, order_id: Option<String>) -> RetrievalOutcome {
    let Some(tools) = &state.tools else {
        return RetrievalOutcome::default();
    };

    let order = match &order_id {
        Some(id) => tools.order_status(id).await,
        None => tools.recent_order_status().await,
    };

    match order {
        Some(order) => RetrievalOutcome {
            documents: vec![order_document(&order)],
        },
        None => RetrievalOutcome::default(),
    }
}

/// JSON-RPC first; semantic index as fallback, gated on confidence.
async fn policy_search(state: &AppState, query: &str) -> RetrievalOutcome {
    if let Some(tools) = &state.tools
        && let Some(policies) = tools.search_policies(query, None).await
        && !policies.is_empty()
    {
        let documents = policies
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let id = p
                    .category
                    .clone()
                    .unwrap_or_else(|| format!("policy-{i}"));
                RetrievedDocument::new(id, format!("Q: {}\nA: {}", p.question, p.answer), 1.0)
            })
            .collect();
        return RetrievalOutcome { documents };
    }

    let documents = state.semantic.retrieve(query).await;
    if !has_high_confidence_results(&documents, state.config.semantic_score_threshold) {
        debug!("semantic fallback below confidence threshold, dropping context");
        return RetrievalOutcome::default();
    }

    RetrievalOutcome { documents }
}

fn cart_document(cart: &CartSnapshot) -> RetrievedDocument {
    let mut text = format!("Cart {}", cart.id);
    if let Some(total) = &cart.total {
        text.push_str(&format!(" | total {total}"));
    }
    if !cart.lines.is_empty() {
        let lines: Vec<String> = cart
            .lines
            .iter()
            .map(|l| {
                let title = l.title.as_deref().unwrap_or(&l.merchandise_id);
                format!("{} x{}", title, l.quantity)
            })
            .collect();
        text.push_str(&format!(" | items: {}", lines.join(", ")));
    }
    if let Some(url) = &cart.checkout_url {
        text.push_str(&format!(" | checkout {url}"));
    }
    RetrievedDocument::new(format!("cart-{}", cart.id), text, 1.0)
}

fn order_document(order: &OrderSummary) -> RetrievedDocument {
    let mut text = format!("Order {} | status {}", order.id, order.status);
    if let Some(url) = &order.tracking_url {
        text.push_str(&format!(" | tracking {url}"));
    }
    if let Some(eta) = &order.estimated_delivery {
        text.push_str(&format!(" | estimated delivery {eta}"));
    }
    RetrievedDocument::new(format!("order-{}", order.id), text, 1.0)
}
