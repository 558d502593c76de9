pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod name;
pub mod simple;
pub mod storage;

use api::{AppState, create_api_router};
use axum::{
    Router,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use config::Config;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{MirrorRoot, SqliteStore};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_rapidoc::RapiDoc;

/// Initialize the tracing subscriber for logging
/// Uses journald when running as a service (no terminal), fmt when running interactively
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pypi_mirror=info,tower_http=warn".into());

    if std::io::stdout().is_terminal() {
        // Running in a terminal, use formatted output
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return;
    }

    // Running as a service, use journald if it is reachable
    match tracing_journald::layer() {
        Ok(journald) => tracing_subscriber::registry()
            .with(env_filter)
            .with(journald)
            .init(),
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            tracing::warn!(error = %e, "journald unavailable, logging to stdout");
        }
    }
}

/// Command line settings that take precedence over the configuration file
#[derive(Debug, Default, Clone)]
pub struct ServiceOptions {
    pub config_path: Option<String>,
    pub port: Option<u16>,
    pub root: Option<PathBuf>,
}

/// Answer any unrouted request with a description of the request itself
async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> String {
    tracing::debug!(%method, %uri, "Echoing unrouted request");

    let mut body = format!(
        "Hello from pypi-mirror {}\nURL: {}\nMethod: {}\nHeaders:\n",
        env!("CARGO_PKG_VERSION"),
        uri,
        method
    );
    for (name, value) in &headers {
        body.push_str(&format!(
            "  {}: {}\n",
            name,
            value.to_str().unwrap_or("<binary>")
        ));
    }
    body
}

async fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// Build the full application router: simple pages, package files, JSON API,
/// documentation and (optionally) metrics
pub fn build_router(state: Arc<AppState>, metrics: Option<PrometheusHandle>) -> Router {
    // Build API routes using utoipa_axum router
    let (api_router, api_doc) = create_api_router(state.clone()).split_for_parts();

    // Build simple repository routes (pip interface)
    let simple_routes = Router::new()
        .route("/simple", get(|| async { Redirect::permanent("/simple/") }))
        .route("/simple/", get(simple::simple))
        .route("/simple/{*rest}", get(simple::simple))
        .with_state(state.clone());

    // Release files are laid out under <root>/packages/ by URL path
    let packages_dir = state.config.mirror.root_path().join("packages");

    // Build documentation routes
    let doc_routes = Router::new()
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", api_doc).path("/api-docs"));

    let mut app = Router::new()
        .merge(api_router)
        .merge(simple_routes)
        .merge(doc_routes)
        .nest_service("/packages", ServeDir::new(packages_dir));

    if let Some(handle) = metrics {
        let path = state.config.metrics.path.clone();
        app = app.route(
            &path,
            get(move || std::future::ready(handle.render())),
        );
    }

    app = if state.config.server.echo_fallback {
        app.fallback(echo)
    } else {
        app.fallback(not_found)
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the mirror server
pub async fn run_service(options: ServiceOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    init_tracing();

    // Log version early
    tracing::info!("pypi-mirror version {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(options.config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if let Some(root) = options.root {
        config.mirror.root = root;
    }

    tracing::info!("Starting server with config: {:?}", config);

    let root = config.mirror.root_path();
    let database = config.mirror.database_path();
    let packages = SqliteStore::open(&database).map_err(|e| {
        tracing::error!(database = %database.display(), error = %e, "Cannot open package database");
        e
    })?;
    // Pin the expanded root so later lookups never depend on $HOME
    config.mirror.root = root.clone();

    let metrics = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| error::Error::Config {
                msg: format!("Failed to install metrics recorder: {}", e),
            })?;
        tracing::info!(path = %config.metrics.path, "Metrics enabled");
        Some(handle)
    } else {
        None
    };

    // Create shared state
    let state = Arc::new(AppState {
        packages: Arc::new(packages),
        files: Arc::new(MirrorRoot::new(&root)),
        config: config.clone(),
    });

    let app = build_router(state, metrics);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(root = %root.display(), "Serving mirror on {}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
