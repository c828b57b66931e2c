/// Server setup and initialization
///
/// Wires together all components: store, auth service, workflow manager, and HTTP routes.
/// Provides the application factory used by the binary and the HTTP tests.

use crate::{
    api::{
        auth::{create_auth_routes, create_me_routes, require_auth},
        components::create_component_routes,
        workflows::create_workflow_routes,
        AppState,
    },
    auth::AuthService,
    config::{Config, DatabaseConfig},
    store::SqliteStore,
    workflow::WorkflowManager,
};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

/// Open the SQLite database, creating its directory if needed
pub async fn open_store(database: &DatabaseConfig) -> Result<SqliteStore> {
    if let Some(dir) = database.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tracing::info!("📁 Ensuring data directory exists: {}", dir.display());
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    }

    SqliteStore::open(&database.path)
        .await
        .with_context(|| format!("failed to open database {}", database.path.display()))
}

/// Build the shared application state on top of `store`
pub fn build_state(config: &Config, store: SqliteStore) -> Result<AppState> {
    let store = Arc::new(store);
    let token_ttl = chrono::Duration::from_std(config.auth.token_ttl).context("token TTL out of range")?;

    let auth = AuthService::new(
        store.clone(),
        config.auth.password,
        config.auth.jwt_secret.as_bytes(),
        token_ttl,
    );
    let workflows = WorkflowManager::new(store.clone(), tracing::info_span!("workflows"));

    Ok(AppState {
        auth: Arc::new(auth),
        workflows: Arc::new(workflows),
        health: store,
        request_timeout: config.server.request_timeout,
    })
}

/// Create the main Axum application with all routes and middleware
///
/// `/healthz`, `/auth/register` and `/auth/login` are public; everything else
/// requires a bearer token.
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(create_me_routes())
        .merge(create_workflow_routes())
        .merge(create_component_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(create_auth_routes())
        .merge(protected)
        .with_state(state)
}

/// Start the HTTP server with the given configuration
///
/// Serves until Ctrl-C, then drains in-flight requests.
pub async fn start_server(config: Config) -> Result<()> {
    tracing::info!("Starting PotaFlow API server...");

    let store = open_store(&config.database).await?;
    let app = create_app(build_state(&config, store)?);

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// Health check endpoint handler
///
/// 200 when the database answers a ping within two seconds, 503 otherwise.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match tokio::time::timeout(Duration::from_secs(2), state.health.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "ok", "db": "ok" }))),
        Ok(Err(e)) => {
            tracing::warn!("⚠️ Health check failed: {}", e);
            unhealthy()
        }
        Err(_) => {
            tracing::warn!("⚠️ Health check timed out");
            unhealthy()
        }
    }
}

fn unhealthy() -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unhealthy", "db": "unreachable" })),
    )
}
