use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::{Map, Value, json};
use tower_http::trace::TraceLayer;

use crate::outline::render_markdown;
use crate::report::DashboardStats;
use crate::settings::Settings;
use crate::snapshot::SnapshotStore;

const NO_MAP_MESSAGE: &str = "No map found. Run the mapper first.";

#[derive(Debug, Clone)]
pub struct AppState {
    snapshot: SnapshotStore,
    settings_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(snapshot: SnapshotStore, settings_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot,
            settings_path: Arc::new(settings_path.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/stats", get(get_stats))
        .route("/api/map", get(get_map))
        .route("/api/outline", get(get_outline))
        .route("/api/settings", get(get_settings).post(post_settings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiError = (StatusCode, String);

/// Runs blocking file work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("join blocking task: {err}"),
            )
        })?
        .map_err(|err| {
            tracing::error!(?err, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
        })
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = blocking(move || {
        let settings = Settings::load(&state.settings_path)?;
        DashboardStats::load(&state.snapshot, &settings)
    })
    .await?;
    Ok(Json(stats))
}

async fn get_map(State(state): State<AppState>) -> Result<Response, ApiError> {
    let forest = blocking(move || state.snapshot.load()).await?;
    let Some(forest) = forest else {
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "error": NO_MAP_MESSAGE }))).into_response());
    };
    Ok(Json(forest).into_response())
}

async fn get_outline(State(state): State<AppState>) -> Result<Response, ApiError> {
    let forest = blocking(move || state.snapshot.load()).await?;
    let Some(forest) = forest else {
        return Ok((StatusCode::NOT_FOUND, NO_MAP_MESSAGE).into_response());
    };

    let mut resp = render_markdown(&forest).into_response();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    Ok(resp)
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    let settings = blocking(move || Settings::load(&state.settings_path)).await?;
    Ok(Json(settings))
}

async fn post_settings(
    State(state): State<AppState>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    Settings::validate_patch(&patch).map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    blocking(move || {
        let mut settings = Settings::load(&state.settings_path)?;
        settings.merge(patch)?;
        settings.save(&state.settings_path)?;
        tracing::info!(has_target = settings.has_target(), "settings updated");
        Ok(())
    })
    .await?;
    Ok(Json(json!({ "success": true })))
}
