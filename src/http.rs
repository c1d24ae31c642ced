//! HTTP front end: compose form, send sessions and broadcast endpoints.

use crate::address::AddressSource;
use crate::dispatch::{Dispatcher, SendReport};
use crate::email::ComposeRequest;
use crate::error::Error;
use crate::session::{into_draft, Draft, SessionRegistry};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::TryStreamExt;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::io::StreamReader;
use tracing::{error, info};
use uuid::Uuid;

/// Embedded HTML UI.
const INDEX_HTML: &str = include_str!("../public/index.html");

/// Multipart field carrying attachment files.
const FILE_FIELD: &str = "file";

const ALREADY_SENT: &str = "Session already sent";

#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    source: Arc<AddressSource>,
}

/// Build the application router.
pub fn router(
    sessions: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    source: Arc<AddressSource>,
    max_upload: usize,
) -> Router {
    let state = AppState {
        sessions,
        dispatcher,
        source,
    };

    Router::new()
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/health", get(health_check))
        .route("/send", post(send_once))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", axum::routing::put(compose).delete(discard))
        .route("/sessions/{id}/attachments", post(attach))
        .route("/sessions/{id}/send", post(send_session))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
}

/// Run the HTTP server until `shutdown` fires.
pub async fn run_http_server(
    listener: TcpListener,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) {
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
    {
        error!("HTTP server error: {e}");
    }
}

/// Error surfaced to HTTP clients as `{"ok": false, "error": ...}`.
enum ApiError {
    NotFound(&'static str),
    Conflict(&'static str),
    BadRequest(String),
    Failed(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::BadRequest(format!("invalid upload: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Failed(e) => {
                error!("Request failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "ok": false, "error": msg }))).into_response()
    }
}

fn sent(report: SendReport) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "recipients": report.recipients,
        "batches": report.batches,
    }))
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
    }))
}

async fn create_session(State(state): State<AppState>) -> Result<Response, ApiError> {
    let id = state.sessions.create()?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn compose(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ComposeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("Session {id} subject: {:?}", req.subject);
    let draft = state.sessions.get_or_open(id)?;
    let mut draft = draft.lock().await;
    if draft.is_consumed() {
        return Err(ApiError::Conflict(ALREADY_SENT));
    }
    draft.compose(&req)?;
    Ok(Json(json!({ "ok": true })))
}

async fn attach(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let draft = state.sessions.get_or_open(id)?;
    let mut draft = draft.lock().await;
    if draft.is_consumed() {
        return Err(ApiError::Conflict(ALREADY_SENT));
    }

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .and_then(|n| n.rsplit(['/', '\\']).next())
            .filter(|n| !n.is_empty())
            .unwrap_or("attachment")
            .to_string();

        let reader = StreamReader::new(field.map_err(io::Error::other));
        tokio::pin!(reader);
        draft.attach(&name, reader).await?;
        info!("Session {id}: attached {name:?}");
    }

    Ok(Json(json!({
        "ok": true,
        "attachments": draft.message().attachment_names(),
    })))
}

async fn send_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ComposeRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let shared = state
        .sessions
        .take(id)
        .ok_or(ApiError::NotFound("No such session"))?;
    let mut draft = into_draft(shared).await?;
    if let Some(Json(req)) = body {
        draft.compose(&req)?;
    }

    let report = state.dispatcher.broadcast(draft, &state.source).await?;
    Ok(sent(report))
}

async fn send_once(
    State(state): State<AppState>,
    Json(req): Json<ComposeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!("subject: {:?}", req.subject);
    let mut draft = Draft::open()?;
    draft.compose(&req)?;

    let report = state.dispatcher.broadcast(draft, &state.source).await?;
    Ok(sent(report))
}

async fn discard(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.sessions.discard(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
