//! HTTP surface of the bulletin service.
//!
//! Public routes read the local cache or the latest live bulletin; internal
//! routes sit behind [`auth::require_internal_key`], applied as a route layer
//! so a rejected request never reaches a handler or an upstream call.

pub mod auth;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Method, middleware, routing::get};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::error::Result;
use crate::models::Config;
use crate::services::{BulletinSource, GazetteClient};
use crate::storage::{BulletinStore, LocalStorage};

use auth::{InternalKey, require_internal_key};
use routes::{
    all_handler, check_handler, database_handler, fallback_handler, health_handler,
    index_handler, latest_handler, local_handler, refresh_handler, status_handler, text_handler,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn BulletinSource>,
    pub store: Arc<dyn BulletinStore>,
    pub internal_key: Arc<InternalKey>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn BulletinSource>,
        store: Arc<dyn BulletinStore>,
        internal_key: InternalKey,
    ) -> Self {
        Self {
            source,
            store,
            internal_key: Arc::new(internal_key),
        }
    }

    /// Live gazette client and local file cache, as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = GazetteClient::from_config(config)?;
        let store = LocalStorage::new(&config.cache.dir);
        Ok(Self::new(
            Arc::new(source),
            Arc::new(store),
            InternalKey::new(config.auth.internal_api_key.as_deref()),
        ))
    }
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/database", get(database_handler))
        .route("/api/database/public", get(database_handler))
        .route("/api/database/status", get(status_handler))
        .route("/api/database/test", get(check_handler))
        .route("/api/BO/local/{locale}", get(local_handler))
        .route("/api/BO/{locale}", get(latest_handler));

    let internal = Router::new()
        .route("/api/BO/{locale}/internal", get(latest_handler))
        .route("/api/BO/ALL/{locale}", get(all_handler))
        .route("/api/BO/ALL/{locale}/internal", get(all_handler))
        .route("/api/BO/Text/{locale}", get(text_handler))
        .route("/api/BO/Text/{locale}/internal", get(text_handler))
        .route("/api/database/refresh", get(refresh_handler))
        .route("/api/database/refresh/internal", get(refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_internal_key,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60));

    public
        .merge(internal)
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn start_server(config: &Config) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_config(config)?;

    match state.internal_key.fingerprint() {
        Some(fingerprint) => info!("Internal endpoints enabled (key sha256 {fingerprint}...)"),
        None => info!("INTERNAL_API_KEY not set, internal endpoints will answer 403"),
    }
    info!("Cache directory: {}", config.cache.dir.display());

    let app = router(state);

    let address = config.server.address();
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
}
