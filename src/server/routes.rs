//! Axum route handlers for the timestamp service.
//!
//! # Routes
//!
//! - `GET  /timestamp` — Returns `{"timestamp": 1622366082}`
//! - `POST /timestamp` — Accepts `{"timestamp": N}`, returns `{"response": "OK"}`
//!
//! Requests without `Content-Type: text/plain` are refused with 415.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cell::GuardedCell;
use crate::timestamp::{self, DecodeError, StatusMessage, Timestamp};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The single stored value.
    pub cell: Arc<GuardedCell<Timestamp>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_initial(Timestamp::INITIAL)
    }

    pub fn with_initial(initial: Timestamp) -> Self {
        Self {
            cell: Arc::new(GuardedCell::new(initial)),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Request rejections. None of them reach the cell.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unable to parse POST payload as a valid json value.")]
    Decode(#[from] DecodeError),

    #[error("Only text/plain content is accepted.")]
    UnsupportedMediaType,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // Keep internals out of the body; the decode detail goes to the log only.
        text_response(self.status(), StatusMessage::new(self.to_string()).to_text())
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/timestamp",
            get(return_timestamp_handler).post(store_timestamp_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app_router(state)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::debug!("Start web server on {:?}", listener.local_addr());
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::debug!("Web server exited.");
    Ok(())
}

fn text_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

fn require_text_plain(headers: &HeaderMap) -> Result<(), ServiceError> {
    let is_text_plain = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("text/plain"))
        .unwrap_or(false);

    if is_text_plain {
        Ok(())
    } else {
        tracing::warn!("Rejected request with content type {:?}", headers.get(header::CONTENT_TYPE));
        Err(ServiceError::UnsupportedMediaType)
    }
}

/// GET /timestamp — return the stored value.
async fn return_timestamp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    require_text_plain(&headers)?;
    let current = state.cell.read().await;
    tracing::debug!(timestamp = %current, "Returning timestamp");
    Ok(text_response(StatusCode::OK, timestamp::encode(current)))
}

/// POST /timestamp — decode the body and, only if it is valid, store it.
async fn store_timestamp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    require_text_plain(&headers)?;
    tracing::debug!("Request body: {}", String::from_utf8_lossy(&body));

    let new_value = timestamp::decode(&body).map_err(|e| {
        tracing::error!("Unable to parse POST payload as a valid json value. Error: {}", e);
        ServiceError::from(e)
    })?;

    state.cell.write(new_value).await;
    tracing::debug!(timestamp = %new_value, "Stored timestamp");

    Ok(text_response(StatusCode::OK, StatusMessage::ok().to_text()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
