use crate::apis::fatsoma::FatsomaApi;
use crate::apis::fixr::FixrTransferApi;
use crate::config::Config;
use crate::db::{EventCleanup, EventSyncer};
use crate::tasks::{self, SyncStatus};
use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Shared state behind every handler
pub struct AppState {
    pub config: Config,
    pub fatsoma: FatsomaApi,
    pub fixr: FixrTransferApi,
    pub syncer: EventSyncer,
    pub cleanup: EventCleanup,
    pub status: SyncStatus,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    city: Option<String>,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
struct TransferQuery {
    transfer_url: String,
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "nightlife-scraper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/status",
            "/events",
            "/events/:event_id",
            "/events/search/:query",
            "/refresh",
            "/fixr/extract-transfer"
        ]
    }))
}

async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "ready": state.status.ready.load(Ordering::SeqCst),
    }))
}

async fn status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let event_count = match state.syncer.count_events().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Failed to count events: {}", e);
            None
        }
    };

    Json(json!({
        "ready": state.status.ready.load(Ordering::SeqCst),
        "startup_complete": state.status.startup_complete.load(Ordering::SeqCst),
        "is_syncing": state.status.is_syncing.load(Ordering::SeqCst),
        "last_sync": state.status.last_sync_time(),
        "event_count": event_count,
    }))
}

async fn list_events(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> impl IntoResponse {
    match state
        .syncer
        .list_events(params.skip, params.limit, params.city.as_deref())
        .await
    {
        Ok(events) => Json(json!({ "count": events.len(), "events": events })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    match state.syncer.get_event(&event_id).await {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Event {} not found", event_id) })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn search_events(
    Extension(state): Extension<Arc<AppState>>,
    Path(query): Path<String>,
) -> impl IntoResponse {
    match state.syncer.search_events(&query).await {
        Ok(events) => Json(json!({ "count": events.len(), "events": events })).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Kick off a background sync. Returns 409 when one is already running.
async fn refresh(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    if tasks::try_spawn_sync(state.clone()) {
        (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "sync started" })),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "status": "sync already in progress" })),
        )
            .into_response()
    }
}

async fn extract_transfer(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<TransferQuery>,
) -> impl IntoResponse {
    match state.fixr.extract_from_transfer_link(&params.transfer_url).await {
        Ok(transfer) => {
            if let Err(e) = state.syncer.save_transfer_event(&transfer).await {
                tracing::warn!("Failed to save transfer event: {}", e);
            }
            Json(json!({
                "event": transfer.event,
                "last_entry_type": transfer.last_entry_type,
                "last_entry_label": transfer.last_entry_label,
                "transferer": transfer.transferer,
                "transfer_url": transfer.transfer_url,
            }))
            .into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn internal_error(e: crate::error::ScraperError) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// Create the HTTP server with all routes
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/events", get(list_events))
        .route("/events/search/:query", get(search_events))
        .route("/events/:event_id", get(get_event))
        .route("/refresh", post(refresh))
        .route("/fixr/extract-transfer", post(extract_transfer))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: Arc<AppState>, port: u16) -> crate::error::Result<()> {
    tasks::start_scheduler(state.clone());

    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🎟️  Events:       http://localhost:{port}/events");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| crate::error::ScraperError::Config(format!("Server error: {e}")))?;

    Ok(())
}
