//! ReportLens API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - PDF upload and indexing
//! - Query answering over the reports corpus and uploaded documents
//! - Interactive streaming chat
//! - Observability (logging, metrics, tracing)

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use reportlens_common::{
    audit::FileAuditSink,
    config::AppConfig,
    context::QueryPipeline,
    index::{IndexStore, PageIndexClient},
    llm::OpenAiChatClient,
    metrics,
    ocr::OcrClient,
};
use reportlens_ingestion::DocumentIndexer;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<QueryPipeline>,
    pub indexer: Arc<DocumentIndexer>,
    pub store: Arc<IndexStore>,
    pub audit: Arc<FileAuditSink>,
    pub chat: Arc<OpenAiChatClient>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting ReportLens API Gateway v{}", reportlens_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr =
            SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Audit sink with its background writer
    let audit = FileAuditSink::spawn(&config.audit.path, config.audit.queue_capacity);

    // Downstream service clients
    let chat = Arc::new(OpenAiChatClient::new(&config.llm)?);
    let index = Arc::new(PageIndexClient::new(&config.retrieval)?);
    let ocr = Arc::new(OcrClient::new(&config.ocr)?);

    let store = IndexStore::new();
    let indexer = Arc::new(DocumentIndexer::new(
        index.clone(),
        store.clone(),
        &config.corpus.upload_dir,
    ));
    let pipeline = Arc::new(QueryPipeline::new(
        chat.clone(),
        index,
        store.clone(),
        ocr,
        audit.clone(),
        &config,
    ));

    // Build the reports index before accepting traffic; a failure leaves
    // the namespace empty and readiness reports it
    info!("Indexing reports corpus from {}", config.corpus.reports_dir);
    match indexer.index_corpus(Path::new(&config.corpus.reports_dir)).await {
        Ok(outcome) => info!(
            documents = outcome.documents,
            chunks = outcome.chunks,
            "Reports corpus ready"
        ),
        Err(e) => warn!(error = %e, "Reports corpus indexing failed"),
    }

    let state = AppState {
        config: config.clone(),
        pipeline,
        indexer,
        store,
        audit,
        chat,
    };

    // Build the router
    let app = create_router(state, config.request_timeout());

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/upload-pdf", post(handlers::upload::upload_pdf))
        .route("/report-query", post(handlers::query::report_query))
        .route("/custom-pdf-query", post(handlers::query::custom_pdf_query))
        .route("/chat", post(handlers::chat::chat));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
