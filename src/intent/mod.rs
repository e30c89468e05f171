//! Utterance classification and retrieval strategy selection.
//!
//! Pure functions only; the selected strategy is executed by the gateway
//! against the tool and semantic clients.

#[cfg(test)]
mod tests;

/// Conversation intents, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Product,
    Cart,
    Order,
    Policy,
    General,
}

/// What the gateway should fetch before prompting the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// `catalog_search` with the raw utterance.
    CatalogSearch,
    /// `get_cart` with the session's cart reference.
    CartView,
    /// `update_cart` with a single line, then `get_cart` semantics on the
    /// returned snapshot. `quantity` 0 removes the line.
    CartMutate { merchandise_id: String, quantity: u32 },
    /// `order_status(id)` when an id is present, else `recent_order_status`.
    OrderStatus { order_id: Option<String> },
    /// `search_policies`, falling back to the semantic index.
    PolicySearch,
    /// No retrieval; prompt from history alone.
    None,
}

/// Jewelry product nouns.
const PRODUCT_NOUNS: &[&str] = &[
    "ring", "necklace", "bracelet", "earring", "pendant", "brooch", "chain", "charm", "cufflink",
    "jewelry", "jewellery", "engagement", "wedding band",
];

/// Material nouns.
const MATERIAL_NOUNS: &[&str] = &[
    "gold", "silver", "platinum", "diamond", "pearl", "amber", "gemstone", "sapphire", "ruby",
    "emerald", "opal", "topaz",
];

/// Purchase verbs and phrases.
const PURCHASE_VERBS: &[&str] = &[
    "buy", "purchase", "shop", "browse", "recommend", "looking for", "show me", "price", "cost",
    "gift",
];

const CART_KEYWORDS: &[&str] = &[
    "cart", "basket", "checkout", "add to", "remove from", "my bag",
];

const ORDER_KEYWORDS: &[&str] = &[
    "order", "shipment", "tracking", "track", "delivery", "delivered", "shipped", "dispatch",
    "status",
];

const POLICY_KEYWORDS: &[&str] = &[
    "policy", "return", "refund", "exchange", "warranty", "shipping", "faq", "hours", "contact",
    "guarantee", "resize", "care",
];

const MUTATE_VERBS: &[&str] = &["add", "put"];
const REMOVE_VERBS: &[&str] = &["remove", "delete", "drop"];

/// Classifies an utterance by case-insensitive lexicon matching, ties broken
/// product > cart > order > policy > general.
pub fn classify(utterance: &str) -> Intent {
    let normalized = utterance.to_lowercase();
    let tokens = tokenize(&normalized);

    if matches_any(&normalized, &tokens, PRODUCT_NOUNS)
        || matches_any(&normalized, &tokens, MATERIAL_NOUNS)
        || matches_any(&normalized, &tokens, PURCHASE_VERBS)
    {
        return Intent::Product;
    }
    if matches_any(&normalized, &tokens, CART_KEYWORDS) {
        return Intent::Cart;
    }
    if matches_any(&normalized, &tokens, ORDER_KEYWORDS) {
        return Intent::Order;
    }
    if matches_any(&normalized, &tokens, POLICY_KEYWORDS) {
        return Intent::Policy;
    }
    Intent::General
}

/// Classifies and refines the utterance into a concrete strategy.
pub fn select_strategy(utterance: &str) -> RetrievalStrategy {
    match classify(utterance) {
        Intent::Product => RetrievalStrategy::CatalogSearch,
        Intent::Cart => match parse_cart_mutation(utterance) {
            Some((merchandise_id, quantity)) => RetrievalStrategy::CartMutate {
                merchandise_id,
                quantity,
            },
            None => RetrievalStrategy::CartView,
        },
        Intent::Order => RetrievalStrategy::OrderStatus {
            order_id: extract_order_id(utterance),
        },
        Intent::Policy => RetrievalStrategy::PolicySearch,
        Intent::General => RetrievalStrategy::None,
    }
}

/// Extracts a `(merchandise id, quantity)` pair from a cart-mutation
/// utterance, `None` when no mutate verb or no plausible id is present.
/// Remove verbs yield quantity 0, which clears the line upstream.
pub fn parse_cart_mutation(utterance: &str) -> Option<(String, u32)> {
    let normalized = utterance.to_lowercase();
    let tokens = tokenize(&normalized);

    let removing = tokens.iter().any(|t| REMOVE_VERBS.contains(&t.as_str()));
    let adding = tokens.iter().any(|t| MUTATE_VERBS.contains(&t.as_str()));
    if !adding && !removing {
        return None;
    }

    // Ids keep their original casing; gids are case-sensitive upstream.
    let raw_tokens = tokenize(utterance);
    let merchandise_id = raw_tokens
        .iter()
        .find(|t| looks_like_merchandise_id(&t.to_lowercase()))?;

    let quantity = if removing {
        0
    } else {
        tokens
            .iter()
            .find_map(|t| t.parse::<u32>().ok().filter(|q| (1..=99).contains(q)))
            .unwrap_or(1)
    };

    Some((merchandise_id.clone(), quantity))
}

/// Finds an order reference: a `#`-prefixed number or a bare numeric token of
/// at least three digits.
pub fn extract_order_id(utterance: &str) -> Option<String> {
    for raw in utterance.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '#');
        if let Some(digits) = token.strip_prefix('#')
            && digits.len() >= 2
            && digits.chars().all(|c| c.is_ascii_digit())
        {
            return Some(digits.to_string());
        }
        if token.len() >= 3 && token.chars().all(|c| c.is_ascii_digit()) {
            return Some(token.to_string());
        }
    }
    None
}

fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(|c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A keyword with a space is matched as a phrase against the whole utterance;
/// single words match tokens exactly, as a plural, or as a prefix for stems
/// of four or more characters ("order" covers "ordered", "ordering").
fn matches_any(normalized: &str, tokens: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        if kw.contains(' ') {
            return normalized.contains(kw);
        }
        tokens.iter().any(|token| {
            token == kw
                || token.strip_suffix('s') == Some(kw)
                || (kw.len() >= 4 && token.starts_with(kw))
        })
    })
}

/// Merchandise ids arrive either as storefront gids or short SKU-like tokens
/// mixing letters and digits.
fn looks_like_merchandise_id(token: &str) -> bool {
    if token.starts_with("gid:") {
        return true;
    }
    let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    has_letter && has_digit
}
