use anyhow::{Context, Result};
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::catalog_routes::{collection_routes, parse_id};
use super::error::ApiError;
use super::upload_routes::upload_routes;
use super::{log_requests, state::*, ServerConfig};
use crate::catalog::stats::{CounterKind, StatsCounter};
use crate::catalog::{
    Banner, MhouseTrack, Repository, SettingsRepository, Track, YoutubeEntry, MASTER_PASSWORD_KEY,
};
use crate::storage::{format_timestamp, BackendMode, Collection, GuardedBackend, ResolvedBackend};
use crate::upload::UploadStore;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub backend: BackendMode,
    pub version: &'static str,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetaResponse {
    last_modified: Option<String>,
    backend: BackendMode,
}

#[derive(Deserialize, Debug)]
struct SettingQuery {
    pub key: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SettingBody {
    #[serde(alias = "key_name")]
    pub key: String,
    #[serde(alias = "key_value")]
    pub value: String,
}

#[derive(Deserialize, Debug)]
struct VerifyBody {
    pub key: Option<String>,
    pub value: String,
}

#[derive(Deserialize, Debug)]
struct StatsBody {
    pub id: Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub catalog: Option<String>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        backend: state.backend.mode,
        version: env!("CARGO_PKG_VERSION"),
    };
    Json(stats)
}

async fn get_meta(State(backend): State<GuardedBackend>) -> Result<Json<MetaResponse>, ApiError> {
    let last_modified = backend
        .last_modified()
        .map_err(crate::catalog::CatalogError::Backend)?;
    Ok(Json(MetaResponse {
        last_modified: last_modified.as_ref().map(format_timestamp),
        backend: backend.mode(),
    }))
}

async fn get_setting(
    State(settings): State<SettingsRepository>,
    query: Result<Query<SettingQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let key = query?
        .0
        .key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Key is required".to_string()))?;
    let value = settings.get(&key)?;
    Ok(Json(json!({ "success": true, "value": value })))
}

async fn put_setting(
    State(settings): State<SettingsRepository>,
    payload: Result<Json<SettingBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    settings.put(&body.key, &body.value)?;
    info!("Updated setting {}", body.key);
    Ok(Json(json!({ "success": true })))
}

async fn verify_setting(
    State(settings): State<SettingsRepository>,
    payload: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let key = body.key.as_deref().unwrap_or(MASTER_PASSWORD_KEY);
    let valid = settings.verify(key, &body.value)?;
    Ok(Json(json!({ "success": true, "valid": valid })))
}

fn stats_target_id(id: &Value) -> Result<i64, ApiError> {
    match id {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid id: {}", n))),
        Value::String(s) => parse_id(s),
        _ => Err(ApiError::BadRequest("ID is required".to_string())),
    }
}

async fn post_stats(
    State(counter): State<StatsCounter>,
    payload: Result<Json<StatsBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let id = stats_target_id(&body.id)?;
    let kind: CounterKind = body.kind.parse()?;
    let catalog = match body.catalog.as_deref() {
        None | Some("") => Collection::Tracks,
        Some(name) => Collection::parse(name)
            .filter(Collection::has_stats)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid catalog: {}", name)))?,
    };
    let stats = counter.increment(catalog, id, kind)?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// Builds the whole application router.
pub fn make_app(config: ServerConfig, backend: ResolvedBackend, uploads: UploadStore) -> Router {
    let state = ServerState::new(config.clone(), backend, uploads);
    let storage = state.backend.backend.clone();

    let api_routes: Router = Router::new()
        .route("/api/meta", get(get_meta))
        .route("/api/settings", get(get_setting).post(put_setting))
        .route("/api/settings/verify", post(verify_setting))
        .route("/api/stats", post(post_stats))
        .merge(upload_routes())
        .with_state(state.clone());

    let catalog_routes: Router = Router::new()
        .merge(collection_routes(Repository::<Track>::new(
            storage.clone(),
            Collection::Tracks,
        )))
        .merge(collection_routes(Repository::<MhouseTrack>::new(
            storage.clone(),
            Collection::Mhouse,
        )))
        .merge(collection_routes(Repository::<Banner>::new(
            storage.clone(),
            Collection::Banners,
        )))
        .merge(collection_routes(Repository::<YoutubeEntry>::new(
            storage,
            Collection::Youtube,
        )));

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .merge(api_routes)
        .merge(catalog_routes)
        .nest_service("/assets/uploads", ServeDir::new(&config.uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

pub async fn run_server(
    config: ServerConfig,
    backend: ResolvedBackend,
    uploads: UploadStore,
) -> Result<()> {
    uploads
        .init()
        .await
        .with_context(|| format!("Failed to create uploads directory {:?}", uploads.root()))?;

    let port = config.port;
    info!(
        "Serving {} catalog from {}",
        backend.mode,
        backend.backend.location()
    );
    let app = make_app(config, backend, uploads);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?)
}
