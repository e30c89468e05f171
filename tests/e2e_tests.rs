//! End-to-end scenarios driven through the public router: signed requests
//! in, SSE frames or JSON out, transcripts in the archive.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use vitrine::gateway::{AppState, DONE_MARKER, create_router_with_state};
use vitrine::provider::{MockProvider, ProviderBackend};
use vitrine::semantic::{MockVectorIndex, SemanticIndexClient, StubEmbedder};
use vitrine::session::store::connect_pool;
use vitrine::session::{
    MemorySessionStore, Role, SessionLimits, SessionRegistry, TranscriptArchive,
};
use vitrine::tools::{CartSnapshot, CatalogProduct, MockToolBackend, ToolBackend};
use vitrine::{Config, auth};

const SECRET: &str = "e2e-proxy-secret";

struct Harness {
    app: Router,
    state: AppState,
    archive: TranscriptArchive,
}

async fn harness(
    config: Config,
    provider: Arc<dyn ProviderBackend>,
    tools: Option<Arc<dyn ToolBackend>>,
    index: MockVectorIndex,
) -> Harness {
    let pool = connect_pool("sqlite::memory:").await.expect("pool");
    let archive = TranscriptArchive::new(pool);
    archive.migrate().await.expect("migrate");

    let limits = SessionLimits {
        max_history: config.max_history,
        rate_limit_window_ms: config.rate_limit_window_ms,
        rate_limit_max: config.rate_limit_max,
    };
    let sessions = Arc::new(SessionRegistry::new(
        Arc::new(MemorySessionStore::new()),
        archive.clone(),
        limits,
    ));

    let semantic = Arc::new(
        SemanticIndexClient::new(Arc::new(StubEmbedder::new(16)), Arc::new(index))
            .with_top_k(config.top_k),
    );

    let state = AppState::new(Arc::new(config), sessions, tools, semantic, provider);
    Harness {
        app: create_router_with_state(state.clone()),
        state,
        archive,
    }
}

fn base_config() -> Config {
    Config {
        proxy_secret: Some(SECRET.to_string()),
        shop_domain: Some("s.example".to_string()),
        ..Default::default()
    }
}

fn signed_post(uri: &str, body: &str) -> Request<Body> {
    let query = uri.split_once('?').map(|(_, q)| q).unwrap_or("");
    let signature = auth::sign_header_mode(SECRET, query, body.as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(auth::SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|frame| {
            let lines: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        })
        .collect()
}

// Scenario: a request signed with the wrong key is turned away with nothing
// but a generic reason.
#[tokio::test]
async fn auth_rejection_is_opaque() {
    let h = harness(
        base_config(),
        Arc::new(MockProvider::with_fragments(&["hi"])),
        None,
        MockVectorIndex::new(),
    )
    .await;

    let wrong_signature = "ab".repeat(32);
    let uri = format!(
        "/chat?shop=s.example&timestamp=1700000000&signature={wrong_signature}"
    );
    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "application/json")
        .body(Body::from(r#"{"message":"hi"}"#))
        .unwrap();

    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_string(response).await;
    assert!(body.contains("unauthorized"));
    assert!(!body.contains("signature"));
}

// Scenario: a product query streams deltas between the metadata frame and
// the sentinel, and the transcript records both turns.
#[tokio::test]
async fn happy_streaming_product_query() {
    let tools = Arc::new(MockToolBackend::with_products(vec![CatalogProduct {
        id: "p1".to_string(),
        name: "Ring X".to_string(),
        price: "100".to_string(),
        url: "u".to_string(),
        image_url: "i".to_string(),
        description: "d".to_string(),
    }]));
    let provider = Arc::new(MockProvider::with_fragments(&["Pro", "duct ", "Ring X"]));
    let h = harness(base_config(), provider, Some(tools), MockVectorIndex::new()).await;

    let response = h
        .app
        .oneshot(signed_post(
            "/chat",
            r#"{"message":"show me rings","session_id":"s","stream":true}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payloads = sse_payloads(&body_string(response).await);
    let frames: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();

    assert_eq!(frames[0], json!({"sessionId": "s", "done": false}));
    assert_eq!(frames[1], json!({"delta": "Pro", "sessionId": "s", "done": false}));
    assert_eq!(frames[2], json!({"delta": "duct ", "sessionId": "s", "done": false}));
    assert_eq!(frames[3], json!({"delta": "Ring X", "sessionId": "s", "done": false}));
    assert_eq!(
        frames[4],
        json!({"content": "Product Ring X", "sessionId": "s", "done": true})
    );
    assert_eq!(payloads.last().unwrap(), DONE_MARKER);

    let session = h.state.sessions.obtain("s").await.unwrap();
    let history = session.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "show me rings"));
    assert_eq!(
        (history[1].role, history[1].content.as_str()),
        (Role::Assistant, "Product Ring X")
    );
}

// Scenario: the JSON-RPC policy path is dead, the semantic index answers,
// and the prompt cites the fallback document.
#[tokio::test]
async fn policy_fallback_chain() {
    let provider = Arc::new(MockProvider::with_fragments(&[
        "Returns are accepted within 30 days [p1].",
    ]));
    let h = harness(
        base_config(),
        provider.clone(),
        Some(Arc::new(MockToolBackend::new())),
        MockVectorIndex::with_document("p1", "30-day returns", 0.9),
    )
    .await;

    let response = h
        .app
        .oneshot(signed_post(
            "/chat",
            r#"{"message":"what is your return policy?","stream":false}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(!body["reply"].as_str().unwrap().is_empty());
    assert!(body["session_id"].is_string());

    let prompt = provider.last_prompt().unwrap();
    assert!(prompt[0].content.contains("p1"));
    assert!(prompt[0].content.contains("30-day returns"));
}

// Scenario: request 21 in a window is rejected, the window before it is not.
#[tokio::test]
async fn rate_limit_window_boundary() {
    let h = harness(
        base_config(),
        Arc::new(MockProvider::with_fragments(&["ok"])),
        None,
        MockVectorIndex::new(),
    )
    .await;

    let body = r#"{"message":"hello","session_id":"burst"}"#;
    for i in 0..20 {
        let response = h
            .app
            .clone()
            .oneshot(signed_post("/chat", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} failed", i + 1);
    }

    let response = h.app.oneshot(signed_post("/chat", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

// Scenario: adding a line reaches the upstream cart in the lines form, the
// reply sees the new total, and the action ring records the add.
#[tokio::test]
async fn cart_mutation_round_trip() {
    let tools = Arc::new(MockToolBackend::new());
    *tools.cart.lock() = Some(CartSnapshot {
        id: "c1".to_string(),
        total: Some("0".to_string()),
        checkout_url: None,
        lines: vec![],
    });
    *tools.updated_cart.lock() = Some(CartSnapshot {
        id: "c1".to_string(),
        total: Some("100".to_string()),
        checkout_url: None,
        lines: vec![],
    });
    let provider = Arc::new(MockProvider::with_fragments(&["Done, the total is now 100."]));

    let h = harness(base_config(), provider.clone(), Some(tools.clone()), MockVectorIndex::new()).await;

    let response = h
        .app
        .clone()
        .oneshot(signed_post(
            "/chat",
            r#"{"message":"add m1 to cart","session_id":"s5","cart_id":"c1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["reply"].as_str().unwrap().contains("100"));

    let updates = tools.recorded_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].lines[0].merchandise_id, "m1");
    assert_eq!(updates[0].lines[0].quantity, 1);
    assert!(provider.last_prompt().unwrap()[0].content.contains("100"));

    let session = h.state.sessions.obtain("s5").await.unwrap();
    let actions = session.cart_actions().await.unwrap();
    assert!(!actions.is_empty());
    assert_eq!(actions[0].action, "add");

    let response = h
        .app
        .oneshot(signed_post(
            "/chat",
            r#"{"message":"what's in my cart?","session_id":"s5","cart_id":"c1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// Scenario: ending a three-turn session leaves exactly one conversation row
// with its messages in order, and the next reference starts empty.
#[tokio::test]
async fn session_archive_on_end() {
    let h = harness(
        base_config(),
        Arc::new(MockProvider::with_fragments(&["hi"])),
        None,
        MockVectorIndex::new(),
    )
    .await;

    let session = h.state.sessions.obtain("s6").await.unwrap();
    session.append(Role::User, "hello").await.unwrap();
    session.append(Role::Assistant, "hi there").await.unwrap();
    session.append(Role::User, "goodbye").await.unwrap();

    h.state.sessions.end("s6").await.unwrap();

    let conversations = h.archive.conversations_for_session("s6").await.unwrap();
    assert_eq!(conversations.len(), 1);
    let conversation = &conversations[0];
    assert!(conversation.started_at <= conversation.ended_at.unwrap());
    assert_eq!(conversation.messages.len(), 3);
    assert_eq!(
        conversation.messages.iter().map(|m| m.role).collect::<Vec<_>>(),
        vec![Role::User, Role::Assistant, Role::User]
    );

    let fresh = h.state.sessions.obtain("s6").await.unwrap();
    assert!(fresh.history().await.unwrap().is_empty());
}

// Retrieval backends can all be dead; chat still answers.
#[tokio::test]
async fn retrieval_outage_is_invisible() {
    let index = MockVectorIndex::new();
    *index.fail.lock() = true;
    let h = harness(
        base_config(),
        Arc::new(MockProvider::with_fragments(&["all good"])),
        Some(Arc::new(MockToolBackend::new())),
        index,
    )
    .await;

    let response = h
        .app
        .oneshot(signed_post(
            "/chat",
            r#"{"message":"what is your return policy?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["reply"], "all good");
}
