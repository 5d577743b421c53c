//! HTTP API.
//!
//! - `POST /api/login` (bridge token): issue or renew a dashboard session
//! - `GET /api/me` (session secret): resolve the caller's identity
//! - `GET /api/global-bl?type=users|levels&id=..`: global blacklist lookup
//! - `POST /api/command` (bridge token): run one chat command
//! - `GET /health`, `GET /metrics`

use crate::db::{BlacklistKind, ChatUser};
use crate::error::SessionError;
use crate::handlers::{ChatMessage, Registry, Reply};
use crate::state::App;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct HttpState {
    pub app: Arc<App>,
    pub registry: Arc<Registry>,
}

/// JSON error body: `{"text": ..., "upstream": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, text: &'static str) -> Self {
        Self {
            status,
            text,
            upstream: None,
        }
    }

    fn unauthorized(text: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, text)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn require_bridge(state: &HttpState, headers: &HeaderMap) -> Result<(), ApiError> {
    match (state.app.config.http.bridge_token.as_deref(), bearer(headers)) {
        (Some(expected), Some(got)) if expected == got => Ok(()),
        _ => {
            warn!("Rejected bridge call with bad token");
            Err(ApiError::unauthorized("Unauthorized"))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub secret: String,
    pub expires_at: i64,
}

pub async fn login(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(user): Json<ChatUser>,
) -> Result<Json<LoginResponse>, ApiError> {
    require_bridge(&state, &headers)?;
    let session = state.app.sessions.login(&user).map_err(|e| {
        error!(user = %user.user_name, error = %e, "Login failed");
        ApiError::internal()
    })?;
    Ok(Json(LoginResponse {
        secret: session.secret,
        expires_at: session.expires_at,
    }))
}

pub async fn me(State(state): State<HttpState>, headers: HeaderMap) -> Result<Json<ChatUser>, ApiError> {
    let Some(secret) = bearer(&headers) else {
        warn!("Client is missing secret");
        return Err(ApiError::unauthorized("Missing secret"));
    };

    let session = match state.app.sessions.authenticate(secret) {
        Ok(session) => session,
        Err(SessionError::Unauthorized) => {
            warn!("Client has unauthorized secret");
            return Err(ApiError::unauthorized("Unauthorized secret"));
        }
        Err(SessionError::Blacklisted(user_id)) => {
            warn!(user = %user_id, "Blacklisted user tried to authenticate");
            return Err(ApiError::unauthorized("Blacklisted"));
        }
        Err(SessionError::Internal(e)) => {
            error!(error = %e, "Session lookup failed");
            return Err(ApiError::internal());
        }
    };

    if let Some(ref upstream) = state.app.config.http.client_version {
        let version = headers.get("version").and_then(|v| v.to_str().ok());
        if version != Some(upstream.as_str()) {
            warn!(user = %session.user_name, "Client is outdated");
            return Err(ApiError {
                status: StatusCode::UNAUTHORIZED,
                text: "Outdated client",
                upstream: Some(upstream.clone()),
            });
        }
    }

    info!(user = %session.user_name, "Authenticated");
    Ok(Json(ChatUser::new(session.user_id, session.user_name)))
}

#[derive(Debug, Deserialize)]
pub struct GlobalBlacklistQuery {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Listed {
    pub listed: bool,
}

pub async fn global_blacklist(
    State(state): State<HttpState>,
    Query(query): Query<GlobalBlacklistQuery>,
) -> Result<Json<Listed>, ApiError> {
    let kind = match query.kind.as_str() {
        "users" => BlacklistKind::Users,
        "levels" => BlacklistKind::Content,
        _ => return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid type")),
    };
    Ok(Json(Listed {
        listed: state.app.blacklists.global_has(kind, &query.id),
    }))
}

pub async fn command(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(msg): Json<ChatMessage>,
) -> Result<Response, ApiError> {
    require_bridge(&state, &headers)?;
    match state.registry.dispatch(&state.app, &msg).await {
        Some(reply) => Ok(Json::<Reply>(reply).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/me", get(me))
        .route("/api/global-bl", get(global_blacklist))
        .route("/api/command", post(command))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the HTTP server. Long-running; spawn it in the background.
pub async fn run_http_server(addr: SocketAddr, state: HttpState) {
    let app = router(state);
    info!(%addr, "HTTP server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "HTTP server error");
    }
}
