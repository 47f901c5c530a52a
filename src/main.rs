//! Snippetbox application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Open storage (Redis or in-memory)
//! 3. Build shared state and the router with its middleware chains
//! 4. Start the session cleanup job
//! 5. Serve until Ctrl-C

use snippetbox::{
    auth::{AppState, PasswordHasher},
    cleanup,
    config::{Config, StorageKind},
    routes,
    storage::{
        MemorySessionBackend, MemorySnippetRepository, MemoryUserRepository,
        RedisSessionBackend, RedisSnippetRepository, RedisUserRepository,
    },
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG), defaulting to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!(?config, "Starting snippetbox");

    let hasher = PasswordHasher::default();
    let state = match config.storage {
        StorageKind::Redis => {
            let redis_url = config.redis_url.as_deref().expect("REDIS_URL is validated");
            let redis_client = redis::Client::open(redis_url).expect("Invalid Redis URL");

            // Verify Redis connection
            let con = redis_client
                .get_multiplexed_async_connection()
                .await
                .expect("Failed to connect to Redis");

            AppState::new(
                config.clone(),
                Arc::new(RedisUserRepository::new(con.clone())),
                Arc::new(RedisSnippetRepository::new(con.clone())),
                Arc::new(RedisSessionBackend::new(con)),
                hasher,
            )
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on restart");
            AppState::new(
                config.clone(),
                Arc::new(MemoryUserRepository::new()),
                Arc::new(MemorySnippetRepository::new()),
                Arc::new(MemorySessionBackend::new()),
                hasher,
            )
        }
    };

    tokio::spawn(cleanup::run_cleanup_loop(
        state.sessions.clone(),
        Duration::from_secs(config.session_cleanup_interval_secs.max(1)),
    ));

    let app = routes::app(state, Path::new("ui/static"));

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> in request logs)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}
