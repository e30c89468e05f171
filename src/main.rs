//! Vitrine HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use vitrine::config::Config;
use vitrine::gateway::{AppState, create_router_with_state};
use vitrine::provider::{ProviderAdapter, ProviderBackend, StaticProvider};
use vitrine::semantic::{
    Embedder, QdrantIndex, RemoteEmbedder, SemanticIndexClient, StubEmbedder, VectorIndex,
};
use vitrine::session::store::connect_pool;
use vitrine::session::{
    SessionLimits, SessionRegistry, SessionStore, SqliteSessionStore, TranscriptArchive,
};
use vitrine::tools::{ToolBackend, ToolClient};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        shop_domain = config.shop_domain.as_deref().unwrap_or("<unset>"),
        "Vitrine gateway starting"
    );

    if config.proxy_secret.is_none() {
        tracing::warn!(
            "PROXY_SECRET is not configured; signed routes will answer 500 unless dev bypass is used"
        );
    }

    let pool = connect_pool(&config.database_url).await?;

    let store = SqliteSessionStore::new(pool.clone());
    store.migrate().await?;
    let archive = TranscriptArchive::new(pool);
    archive.migrate().await?;

    let limits = SessionLimits {
        max_history: config.max_history,
        rate_limit_window_ms: config.rate_limit_window_ms,
        rate_limit_max: config.rate_limit_max,
    };
    let sessions = Arc::new(SessionRegistry::new(
        Arc::new(store) as Arc<dyn SessionStore>,
        archive,
        limits,
    ));

    let embedder: Arc<dyn Embedder> = match &config.embedding_url {
        Some(url) => Arc::new(RemoteEmbedder::new(
            url.clone(),
            config.llm_provider_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dim,
        )),
        None => {
            tracing::warn!("no EMBEDDING_URL configured, running embedder in stub mode");
            Arc::new(StubEmbedder::new(config.embedding_dim))
        }
    };
    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(&config.qdrant_url)?);
    let semantic = Arc::new(
        SemanticIndexClient::new(embedder, index).with_top_k(config.top_k),
    );

    let tools: Option<Arc<dyn ToolBackend>> = match &config.shop_domain {
        Some(domain) => Some(Arc::new(ToolClient::new(domain))),
        None => {
            tracing::warn!("no SHOP_DOMAIN configured, tool retrieval disabled");
            None
        }
    };

    let provider: Arc<dyn ProviderBackend> = if config.mock_provider {
        tracing::warn!("MOCK_PROVIDER is set, serving canned replies");
        Arc::new(StaticProvider::canned())
    } else {
        Arc::new(ProviderAdapter::from_config(&config))
    };

    let state = AppState::new(Arc::new(config), sessions, tools, semantic, provider);
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Vitrine shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/health", port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
