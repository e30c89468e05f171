use super::*;

#[test]
fn test_product_classification() {
    assert_eq!(classify("show me rings"), Intent::Product);
    assert_eq!(classify("do you have gold necklaces?"), Intent::Product);
    assert_eq!(classify("I'm looking for a gift"), Intent::Product);
    assert_eq!(classify("how much does the pearl pendant cost"), Intent::Product);
}

#[test]
fn test_cart_classification() {
    assert_eq!(classify("what's in my cart?"), Intent::Cart);
    assert_eq!(classify("add m1 to cart"), Intent::Cart);
    assert_eq!(classify("empty my basket please"), Intent::Cart);
}

#[test]
fn test_order_classification() {
    assert_eq!(classify("where is my order?"), Intent::Order);
    assert_eq!(classify("I ordered last week, any update?"), Intent::Order);
    assert_eq!(classify("tracking number for shipment 1001"), Intent::Order);
}

#[test]
fn test_policy_classification() {
    assert_eq!(classify("what is your return policy?"), Intent::Policy);
    assert_eq!(classify("can I get a refund"), Intent::Policy);
    assert_eq!(classify("can you resize my band?"), Intent::Policy);
}

#[test]
fn test_general_classification() {
    assert_eq!(classify("hello there"), Intent::General);
    assert_eq!(classify("thanks!"), Intent::General);
}

#[test]
fn test_product_wins_ties() {
    // Mentions both a product noun and the cart; product has priority.
    assert_eq!(classify("is the ring still in my cart"), Intent::Product);
}

#[test]
fn test_cart_wins_over_order() {
    assert_eq!(classify("add m1 to cart and check status later"), Intent::Cart);
}

#[test]
fn test_select_strategy_product() {
    assert_eq!(select_strategy("show me rings"), RetrievalStrategy::CatalogSearch);
}

#[test]
fn test_select_strategy_cart_view() {
    assert_eq!(select_strategy("what's in my cart?"), RetrievalStrategy::CartView);
}

#[test]
fn test_select_strategy_cart_mutate() {
    assert_eq!(
        select_strategy("add m1 to cart"),
        RetrievalStrategy::CartMutate {
            merchandise_id: "m1".to_string(),
            quantity: 1,
        }
    );
    assert_eq!(
        select_strategy("add 2 of m42 to my basket"),
        RetrievalStrategy::CartMutate {
            merchandise_id: "m42".to_string(),
            quantity: 2,
        }
    );
}

#[test]
fn test_select_strategy_cart_remove() {
    assert_eq!(
        select_strategy("remove m1 from my cart"),
        RetrievalStrategy::CartMutate {
            merchandise_id: "m1".to_string(),
            quantity: 0,
        }
    );
}

#[test]
fn test_mutate_without_id_degrades_to_view() {
    assert_eq!(
        select_strategy("add something nice to my cart"),
        RetrievalStrategy::CartView
    );
}

#[test]
fn test_select_strategy_order_with_id() {
    assert_eq!(
        select_strategy("status of order #1001"),
        RetrievalStrategy::OrderStatus {
            order_id: Some("1001".to_string()),
        }
    );
    assert_eq!(
        select_strategy("where is order 20553"),
        RetrievalStrategy::OrderStatus {
            order_id: Some("20553".to_string()),
        }
    );
}

#[test]
fn test_select_strategy_order_without_id() {
    assert_eq!(
        select_strategy("where is my order?"),
        RetrievalStrategy::OrderStatus { order_id: None }
    );
}

#[test]
fn test_select_strategy_policy_and_general() {
    assert_eq!(select_strategy("what is your return policy?"), RetrievalStrategy::PolicySearch);
    assert_eq!(select_strategy("hello"), RetrievalStrategy::None);
}

#[test]
fn test_gid_is_a_merchandise_id() {
    assert_eq!(
        parse_cart_mutation("add gid://shop/ProductVariant/123 please"),
        Some(("gid://shop/ProductVariant/123".to_string(), 1))
    );
}

#[test]
fn test_order_id_requires_digits() {
    assert_eq!(extract_order_id("where is my order"), None);
    assert_eq!(extract_order_id("order #42"), Some("42".to_string()));
    assert_eq!(extract_order_id("order 123"), Some("123".to_string()));
}

#[test]
fn test_classification_is_case_insensitive() {
    assert_eq!(classify("SHOW ME RINGS"), Intent::Product);
    assert_eq!(classify("Return POLICY?"), Intent::Policy);
}
