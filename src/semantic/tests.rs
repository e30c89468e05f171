use std::collections::HashMap;
use std::sync::Arc;

use super::*;

fn client_with(index: MockVectorIndex) -> SemanticIndexClient {
    SemanticIndexClient::new(Arc::new(StubEmbedder::new(16)), Arc::new(index))
}

#[tokio::test]
async fn test_retrieve_formats_documents() {
    let index = MockVectorIndex::with_matches(vec![
        ScoredMatch {
            id: "p1".to_string(),
            score: 0.9,
            payload: HashMap::from([
                ("text".to_string(), "30-day returns".to_string()),
                ("category".to_string(), "returns".to_string()),
            ]),
        },
        ScoredMatch {
            id: "p2".to_string(),
            score: 0.4,
            payload: HashMap::from([("text".to_string(), "free shipping over 200".to_string())]),
        },
    ]);

    let docs = client_with(index).retrieve("return policy").await;

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "p1");
    assert_eq!(docs[0].text, "30-day returns");
    assert_eq!(docs[0].metadata.get("category").map(String::as_str), Some("returns"));
    assert!(!docs[0].metadata.contains_key("text"));
}

#[tokio::test]
async fn test_matches_without_text_are_dropped() {
    let index = MockVectorIndex::with_matches(vec![ScoredMatch {
        id: "p1".to_string(),
        score: 0.9,
        payload: HashMap::from([("category".to_string(), "returns".to_string())]),
    }]);

    let docs = client_with(index).retrieve("anything").await;
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_search_failure_yields_empty() {
    let index = MockVectorIndex::with_document("p1", "doc", 0.9);
    *index.fail.lock() = true;

    let docs = client_with(index).retrieve("anything").await;
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_yields_empty() {
    let index = MockVectorIndex::with_document("p1", "doc", 0.9);
    let client = SemanticIndexClient::new(Arc::new(FailingEmbedder), Arc::new(index));

    let docs = client.retrieve("anything").await;
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_top_k_is_respected() {
    let index = MockVectorIndex::with_matches(
        (0..5)
            .map(|i| ScoredMatch {
                id: format!("p{i}"),
                score: 0.5,
                payload: HashMap::from([("text".to_string(), format!("doc {i}"))]),
            })
            .collect(),
    );

    let docs = client_with(index).with_top_k(2).retrieve("anything").await;
    assert_eq!(docs.len(), 2);
}

#[tokio::test]
async fn test_scores_are_clamped() {
    let index = MockVectorIndex::with_document("p1", "doc", 1.3);
    let docs = client_with(index).retrieve("anything").await;
    assert_eq!(docs[0].score, 1.0);
}

#[test]
fn test_confidence_gate() {
    let docs = vec![
        RetrievedDocument::new("a", "low", 0.2),
        RetrievedDocument::new("b", "mid", 0.69),
    ];
    assert!(!has_high_confidence_results(&docs, DEFAULT_CONFIDENCE_THRESHOLD));

    let docs = vec![RetrievedDocument::new("c", "high", 0.7)];
    assert!(has_high_confidence_results(&docs, DEFAULT_CONFIDENCE_THRESHOLD));

    assert!(!has_high_confidence_results(&[], DEFAULT_CONFIDENCE_THRESHOLD));
}

#[tokio::test]
async fn test_stub_embedder_is_deterministic_and_normalized() {
    let embedder = StubEmbedder::new(32);
    let a = embedder.embed("rings").await.unwrap();
    let b = embedder.embed("rings").await.unwrap();
    let c = embedder.embed("necklaces").await.unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 32);

    let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}
