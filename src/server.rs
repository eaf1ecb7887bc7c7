//! HTTP surface: one POST endpoint per conversion mode.
//!
//! | Route | Body |
//! |-------|------|
//! | `POST /api/generate-pdf` | `{ "url": "https://…" }` |
//! | `POST /api/generate-pdf-from-html` | `{ "html": "<!DOCTYPE html>…" }` |
//! | `GET /health` | none |
//!
//! Successful conversions answer with the PDF as an attachment; failures
//! answer with `{ "error": "…" }` and the status from
//! [`ConvertError::status_code`].

use crate::config::{ServiceConfig, Stage};
use crate::converter::{PdfConverter, RenderedPdf};
use crate::error::ConvertError;
use crate::request::{ConversionMode, ConversionRequest};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};

pub const URL_ROUTE: &str = "/api/generate-pdf";
pub const HTML_ROUTE: &str = "/api/generate-pdf-from-html";
pub const HEALTH_ROUTE: &str = "/health";

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    converter: Arc<PdfConverter>,
    stage: Stage,
    max_html_bytes: usize,
}

impl AppState {
    pub fn new(converter: PdfConverter, config: &ServiceConfig) -> Self {
        Self {
            converter: Arc::new(converter),
            stage: config.stage,
            max_html_bytes: config.max_html_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Builds the service router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(URL_ROUTE, post(generate_from_url))
        .route(HTML_ROUTE, post(generate_from_html))
        .route(HEALTH_ROUTE, get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn generate_from_url(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    handle(state, ConversionMode::Url, body).await
}

async fn generate_from_html(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    handle(state, ConversionMode::Html, body).await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[instrument(skip(state, body))]
async fn handle(
    state: AppState,
    mode: ConversionMode,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ConvertError::BodyTooLarge
            } else {
                ConvertError::MalformedBody(rejection.body_text())
            };
            return error_response(err, mode, state.stage);
        }
    };

    let request = match ConversionRequest::from_body(mode, &body, state.max_html_bytes) {
        Ok(request) => request,
        Err(err) => return error_response(err, mode, state.stage),
    };

    match state.converter.convert(request).await {
        Ok(pdf) => pdf_response(pdf),
        Err(err) => error_response(err, mode, state.stage),
    }
}

fn pdf_response(pdf: RenderedPdf) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf.filename),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        pdf.bytes,
    )
        .into_response()
}

fn error_response(err: ConvertError, mode: ConversionMode, stage: Stage) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.is_client_error() {
        warn!(status = status.as_u16(), error = %err, "Rejected conversion request");
    } else {
        error!(status = status.as_u16(), error = %err, "PDF generation error");
    }

    let body = ErrorBody {
        error: err.public_message(mode, stage),
    };
    (status, Json(body)).into_response()
}
