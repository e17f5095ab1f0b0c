//! HTTP surface of the service.
//!
//! [`AppState`] is built once at startup and shared by every request. The
//! router exposes:
//!
//! | Route | Auth | Purpose |
//! |-------|------|---------|
//! | `POST /predict/`, `POST /predict` | bearer token | classify a note |
//! | `GET /health` | none | liveness |
//!
//! Prediction bodies are capped at `max_body_bytes` (0 disables the cap);
//! larger bodies are rejected with `413` before they are parsed.

mod error;
mod handler;

use crate::config::ServiceConfig;
use crate::model::{Classifier, LexiconClassifier, PredictionBulkhead, PredictionBulkheadConfig};
use crate::services::{PredictionService, ResultRecorder, TokenSet};
use crate::{Error, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::future::Future;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Immutable state shared by all requests.
#[derive(Debug, Clone)]
pub struct AppState {
    tokens: TokenSet,
    predictions: PredictionService,
    recorder: ResultRecorder,
    max_content_length: usize,
    max_body_bytes: usize,
}

impl AppState {
    /// Creates state from already-constructed parts.
    #[must_use]
    pub const fn new(
        tokens: TokenSet,
        predictions: PredictionService,
        recorder: ResultRecorder,
        max_content_length: usize,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            tokens,
            predictions,
            recorder,
            max_content_length,
            max_body_bytes,
        }
    }

    /// Builds state from configuration around the given classifier.
    #[must_use]
    pub fn with_classifier(config: &ServiceConfig, classifier: Arc<dyn Classifier>) -> Self {
        let bulkhead =
            PredictionBulkhead::new(classifier, PredictionBulkheadConfig::from(&config.prediction));

        Self::new(
            TokenSet::from_secrets(&config.tokens),
            PredictionService::new(bulkhead),
            ResultRecorder::new(config.record_path.clone(), config.record_enabled),
            config.max_content_length,
            config.max_body_bytes,
        )
    }

    /// Loads the model named by the configuration and builds state around it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] if the model file cannot be loaded.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let classifier = LexiconClassifier::load(&config.model_path)?;
        Ok(Self::with_classifier(config, Arc::new(classifier)))
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = if state.max_body_bytes == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(state.max_body_bytes)
    };
    let state = Arc::new(state);

    let predict = Router::new()
        .route("/predict/", post(handler::predict))
        .route("/predict", post(handler::predict))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handler::require_token,
        ))
        .layer(body_limit);

    Router::new()
        .route("/health", get(handler::health))
        .merge(predict)
        .layer(CatchPanicLayer::custom(handler::panic_response))
        .layer(middleware::from_fn(handler::track_request))
        // Security headers (OWASP recommendations)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on the configured address until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the address cannot be bound or the
/// server fails.
pub async fn serve<F>(config: &ServiceConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;

    tracing::info!(
        addr = %addr,
        record_enabled = config.record_enabled,
        max_content_length = config.max_content_length,
        "Starting prediction server"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
