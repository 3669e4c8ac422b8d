use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::ClassifierParams;
use crate::detect::{ClassificationUpdate, EventToggles};
use crate::engine::core::{ClassifierPatch, SentryHandle, TelemetryEvent};
use crate::telemetry::{self, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub handle: &'static SentryHandle,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(handle: &'static SentryHandle, token: String) -> Self {
        Self {
            handle,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(&'static str),
    Backpressure,
    ServiceUnavailable(&'static str),
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Backpressure => (
                StatusCode::TOO_MANY_REQUESTS,
                "command queue saturated".into(),
            ),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.into()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine_running: bool,
    pub uptime_ms: u64,
    pub toggles: EventToggles,
}

/// Metrics endpoint response payload.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub latest_update: Option<ClassificationUpdate>,
    pub latest_telemetry: Option<TelemetryEvent>,
    pub diagnostics: TelemetrySnapshot,
}

/// Parameter description payload.
#[derive(Debug, Serialize)]
pub struct ParamDescriptor {
    pub supported: &'static [&'static str],
    pub current: ClassifierParams,
}

/// Command acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct ParamAck {
    pub accepted: bool,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/notification-stream", get(notification_stream_handler))
        .route("/params", get(list_params).post(apply_params))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    Ok(Json(HealthResponse {
        status: "ok",
        engine_running: state.handle.is_running(),
        uptime_ms: state.handle.uptime_ms(),
        toggles: state.handle.toggles_snapshot(),
    }))
}

pub async fn metrics(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let latest_update = state
        .handle
        .broadcasts
        .subscribe_updates()
        .and_then(|mut rx| drain_broadcast(&mut rx));

    let latest_telemetry = {
        let mut telemetry_rx = state.handle.telemetry_receiver();
        drain_broadcast(&mut telemetry_rx)
    };
    let diagnostics = telemetry::hub().snapshot();

    Ok(Json(MetricsResponse {
        latest_update,
        latest_telemetry,
        diagnostics,
    }))
}

pub async fn notification_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::NotificationStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    sse::notifications(state.handle)
}

pub async fn list_params(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<ParamDescriptor>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let current = state.handle.config_snapshot().classifier;

    Ok(Json(ParamDescriptor {
        supported: &[
            "overlap_position",
            "max_results",
            "score_threshold",
            "num_threads",
        ],
        current,
    }))
}

pub async fn apply_params(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(patch): Json<ClassifierPatch>,
) -> Result<Json<ParamAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    if patch.is_empty() {
        return Err(HttpServerError::BadRequest(
            "at least one parameter must be provided",
        ));
    }

    let sender = state.handle.command_sender();
    sender.try_send(patch).map_err(map_try_send_error)?;

    Ok(Json(ParamAck { accepted: true }))
}

fn map_try_send_error(err: TrySendError<ClassifierPatch>) -> HttpServerError {
    match err {
        TrySendError::Full(_) => HttpServerError::Backpressure,
        TrySendError::Closed(_) => {
            HttpServerError::ServiceUnavailable("param command channel closed")
        }
    }
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}

fn drain_broadcast<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(value) => latest = Some(value),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Closed) => return None,
        }
    }
    latest
}
