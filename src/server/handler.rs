//! Request handlers and middleware.
//!
//! A prediction request moves through authorization (middleware, before the
//! body is read), body parsing, validation, prediction and recording. The
//! first failure ends the request with the status of its error.

use super::AppState;
use crate::observability::{REQUEST_ID_HEADER, RequestContext, scope_request_context};
use crate::services::{Prediction, validate_note};
use crate::{Error, Result};
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Body of `POST /predict/`.
#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(default)]
    note: Option<String>,
}

/// Assigns a request ID, opens a span for the request, and counts responses.
pub async fn track_request(request: Request, next: Next) -> Response {
    let context = RequestContext::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let request_id = context.request_id().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        status = tracing::field::Empty,
    );

    let is_predict = request.uri().path().starts_with("/predict");

    let start = Instant::now();
    let mut response = scope_request_context(context, next.run(request))
        .instrument(span.clone())
        .await;

    let status = response.status();
    span.record("status", status.as_u16());
    if is_predict {
        metrics::counter!("predict_requests_total", "status" => status.as_u16().to_string())
            .increment(1);
        metrics::histogram!("predict_request_duration_seconds")
            .record(start.elapsed().as_secs_f64());
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Rejects requests without an accepted bearer token.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state.tokens.authorize_header(header) {
        tracing::warn!(header_present = header.is_some(), "Rejected bearer token");
        metrics::counter!("auth_failures_total").increment(1);
        return e.into_response();
    }

    next.run(request).await
}

/// `POST /predict/`
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let result = match body {
        Ok(body) => run_prediction(&state, &body).await,
        Err(rejection) => Err(body_error(&rejection)),
    };
    match result {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::error!(error = %e, "Prediction request failed");
            } else {
                tracing::info!(error = %e, "Prediction request rejected");
            }
            e.into_response()
        },
    }
}

fn body_error(rejection: &BytesRejection) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(rejection.body_text())
    } else {
        Error::MalformedBody(rejection.body_text())
    }
}

async fn run_prediction(state: &AppState, body: &[u8]) -> Result<Prediction> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| Error::MalformedBody(e.to_string()))?;
    // Derived struct deserialization also accepts arrays.
    if !value.is_object() {
        return Err(Error::MalformedBody("expected a JSON object".to_string()));
    }
    let request: PredictRequest =
        serde_json::from_value(value).map_err(|e| Error::MalformedBody(e.to_string()))?;
    let note = request.note.unwrap_or_default();

    let text = validate_note(&note, state.max_content_length)?.into_owned();
    let prediction = state.predictions.predict(text).await?;

    state.recorder.record_async(note, prediction.score).await;

    Ok(prediction)
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Converts a handler panic into a 500 response.
#[allow(clippy::needless_pass_by_value)]
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Request handler panicked");

    Error::OperationFailed {
        operation: "handle_request".to_string(),
        cause: "request handler panicked".to_string(),
    }
    .into_response()
}
