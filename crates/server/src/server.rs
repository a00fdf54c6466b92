//! HTTP server exposing the chat relay endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{sse::Event, Html, IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::{
    session::{self, SessionEvent},
    store::MessageLog,
    types::{Role, ServerOptions, ValidationError},
};

/// The embedded single-page chat client served at `/`.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MessageLog>,
    pub options: ServerOptions,
}

/// Body of `POST /api/message`.
///
/// Missing fields default to empty strings and are rejected by validation,
/// mirroring how a missing body is treated as an empty one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewMessage {
    pub role: String,
    pub content: String,
    pub name: String,
}

/// Create the router with all relay endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/stream", get(handle_stream))
        .route("/api/message", post(handle_post_message))
        .route("/api/messages", get(handle_list_messages))
        .route("/api/clear", post(handle_clear))
        .layer(cors)
        .with_state(state)
}

/// GET / - Serve the chat page
async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /stream - Open a persistent SSE stream
///
/// Honors the standard `Last-Event-ID` header for resume; absent or
/// unparsable values fall back to 0 (full backlog).
async fn handle_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let resume_from = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    debug!(resume_from, "Stream connected");

    let events = session::event_stream(
        state.store.clone(),
        resume_from,
        state.options.heartbeat_interval,
    )
    .map(|event| match event {
        SessionEvent::Message(msg) => Event::default()
            .id(msg.id.to_string())
            .event("message")
            .json_data(&msg),
        SessionEvent::Clear => Ok(Event::default().event("clear").data("{}")),
        SessionEvent::Heartbeat => Ok(Event::default().comment("ping")),
    });

    let mut response = Sse::new(events).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Tell nginx-style proxies not to buffer the stream.
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

/// POST /api/message - Validate and append a message
async fn handle_post_message(
    State(state): State<AppState>,
    body: Option<Json<NewMessage>>,
) -> Response {
    let Json(body) = body.unwrap_or_default();

    let role = match Role::parse(&body.role) {
        Ok(role) => role,
        Err(e) => return validation_error(e),
    };

    let content = body.content.trim();
    if content.is_empty() {
        return validation_error(ValidationError::EmptyContent);
    }

    let name = body.name.trim();
    let msg = state
        .store
        .append(role, content.to_string(), name.to_string());

    (StatusCode::CREATED, Json(msg)).into_response()
}

/// GET /api/messages - All retained messages, oldest first
async fn handle_list_messages(State(state): State<AppState>) -> Response {
    Json(state.store.list_all()).into_response()
}

/// POST /api/clear - Wipe history and advance the epoch
async fn handle_clear(State(state): State<AppState>) -> Response {
    state.store.clear();
    Json(serde_json::json!({ "status": "cleared" })).into_response()
}

fn validation_error(err: ValidationError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Start the server.
pub async fn start_server(options: ServerOptions) -> std::io::Result<()> {
    let store = MessageLog::new(options.capacity);
    let state = AppState {
        store,
        options: options.clone(),
    };

    let router = create_router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting chat relay server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
