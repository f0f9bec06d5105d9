use axum::http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{AppConfig, ServerConfig};
use crate::error::{VersoError, VersoResult};
use crate::service::VersionControlService;
use crate::store::open_backend;

pub mod error;
pub mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VersionControlService>,
    /// Content stream targeted by `POST /content/{versionId}/tags`.
    pub default_content_id: String,
}

impl AppState {
    pub fn new(service: Arc<VersionControlService>, config: &ServerConfig) -> Self {
        Self {
            service,
            default_content_id: config.default_content_id.clone(),
        }
    }
}

/// Build the application router with its middleware stack.
///
/// Static `tags` segments take priority over the `:id` parameter, so a
/// content stream literally named `tags` is not addressable.
pub fn build_router(state: AppState, config: &ServerConfig) -> VersoResult<Router> {
    let cors = build_cors_layer(config)?;

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/content/tags", get(handlers::list_tags))
        .route(
            "/content/tags/:name",
            get(handlers::get_tag)
                .put(handlers::rename_tag)
                .delete(handlers::delete_tag),
        )
        .route(
            "/content/:id",
            get(handlers::current_version).post(handlers::create_version),
        )
        .route("/content/:id/tags", post(handlers::create_default_tag))
        .route("/content/:id/versions", get(handlers::list_versions))
        .route(
            "/content/:id/versions/:version_id",
            get(handlers::get_version).delete(handlers::delete_version),
        )
        .route(
            "/content/:id/versions/:version_id/publish",
            post(handlers::publish),
        )
        .route(
            "/content/:id/versions/:version_id/unpublish",
            post(handlers::unpublish),
        )
        .route("/content/:id/versions/:version_id/diff", get(handlers::diff))
        .route(
            "/content/:id/versions/:version_id/tags",
            get(handlers::list_version_tags).post(handlers::create_version_tag),
        )
        .route("/content/:id/revert", post(handlers::revert))
        .route("/content/:id/publish-history", get(handlers::publish_history))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    Ok(router)
}

/// Permissive when no origins are configured.
fn build_cors_layer(config: &ServerConfig) -> VersoResult<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|err| {
                VersoError::ConfigError(format!("invalid CORS origin '{origin}': {err}"))
            })
        })
        .collect::<VersoResult<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600)))
}

pub async fn run_http_server(config: AppConfig) -> VersoResult<()> {
    let backend = open_backend(&config.storage)?;
    let service = Arc::new(VersionControlService::new(backend, config.limits));
    let state = AppState::new(service, &config.server);
    let app = build_router(state, &config.server)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|err| VersoError::ConfigError(format!("invalid server address: {err}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| VersoError::Internal(format!("failed to bind server: {err}")))?;
    tracing::info!(%addr, "Verso listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| VersoError::Internal(format!("server error: {err}")))?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
