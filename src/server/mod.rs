//! HTTP transport for the batch converter.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use cafconvert_av::{FfmpegTranscoder, ToolRegistry, Transcoder};
use cafconvert_core::config::Config;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::batch::BatchConverter;

pub mod error;
pub mod request_id;
pub mod routes;

pub use error::AppError;
pub use request_id::{request_id_middleware, X_REQUEST_ID};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub converter: Arc<BatchConverter>,
}

impl AppContext {
    /// Assemble a context around an arbitrary transcoder.
    pub fn new(config: Config, tools: ToolRegistry, transcoder: Arc<dyn Transcoder>) -> Self {
        let converter = BatchConverter::from_config(transcoder, &config);
        Self {
            config: Arc::new(config),
            tools: Arc::new(tools),
            converter: Arc::new(converter),
        }
    }

    /// Discover ffmpeg and build a context that converts with it.
    pub fn from_config(config: Config) -> Self {
        let tools = ToolRegistry::discover(&config.tools);
        let transcoder = FfmpegTranscoder::discover(&tools, &config.conversion);
        Self::new(config, tools, Arc::new(transcoder))
    }
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/api/tools", get(routes::tools))
        .route("/convert", post(routes::convert))
        .layer(DefaultBodyLimit::max(ctx.config.server.max_upload_bytes))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Create the upload root and the deliverable directory if missing.
pub fn prepare_directories(config: &Config) -> Result<()> {
    for dir in [
        config.storage.resolved_upload_dir(),
        config.storage.resolved_output_dir(),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        tracing::debug!("Using directory {}", dir.display());
    }
    Ok(())
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    prepare_directories(&config)?;

    let ctx = AppContext::from_config(config);
    tracing::info!(
        policy = ?ctx.converter.policy(),
        upload_dir = %ctx.converter.upload_dir().display(),
        output_dir = %ctx.converter.output_dir().display(),
        "Batch converter ready"
    );

    let app = build_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
