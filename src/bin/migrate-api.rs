//! Migration API - HTTP trigger for the legacy dump migration
//!
//! Exposes run, status and preview over HTTP. Only one run may be active at a
//! time; a second request while one is in progress gets `409 Conflict`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use legacy_migrate::dump::ParseError;
use legacy_migrate::{
    Migration, MigrationConfig, MigrationError, MigrationStatus, MigrationSummary, PgStore,
    TablePreview,
};
use serde::Deserialize;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_PREVIEW_LIMIT: usize = 20;

#[derive(Clone)]
struct AppState {
    migration: Arc<Migration>,
    store: PgStore,
    run_lock: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
    last_run: Arc<RwLock<Option<MigrationSummary>>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MigrationConfig::from_env();
    let migration = Migration::from_config(&config)?;

    let database_url = config.require_database_url()?.to_string();
    let pool_config = config.database.clone();
    let store =
        tokio::task::spawn_blocking(move || PgStore::connect(&database_url, &pool_config)).await??;

    let state = Arc::new(AppState {
        migration: Arc::new(migration),
        store,
        run_lock: Arc::new(Mutex::new(())),
        running: Arc::new(AtomicBool::new(false)),
        last_run: Arc::new(RwLock::new(None)),
    });

    let app = Router::new()
        .route("/migration/run", post(run_migration))
        .route("/migration/status", get(migration_status))
        .route("/migration/preview/:table", get(preview_table))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Migration API listening on {}", addr);
    tracing::info!("Legacy dump: {}", config.dump_path.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the migration once and return its summary.
async fn run_migration(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MigrationSummary>, AppError> {
    let guard = state
        .run_lock
        .clone()
        .try_lock_owned()
        .map_err(|_| AppError::Conflict("A migration run is already in progress".to_string()))?;

    let migration = state.migration.clone();
    let mut store = state.store.clone();
    let running = state.running.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let _running = RunningFlag::raise(running);
        migration.run(&mut store)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Migration task failed: {}", e)))??;

    tracing::info!(
        "Run {} finished: {} inserted, {} skipped, {} errors",
        summary.run_id,
        summary.success_count,
        summary.skipped_count,
        summary.error_count
    );
    *state.last_run.write().await = Some(summary.clone());
    Ok(Json(summary))
}

/// Marks a run as active for the lifetime of the value.
struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    fn raise(flag: Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    running: bool,
    #[serde(flatten)]
    status: MigrationStatus,
    last_run: Option<LastRun>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct LastRun {
    run_id: String,
    finished_at: String,
    success_count: usize,
    skipped_count: usize,
    warning_count: usize,
    error_count: usize,
}

/// Destination tables with row counts, plus the outcome of the last run.
async fn migration_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let running = state.running.load(Ordering::SeqCst);
    let migration = state.migration.clone();
    let mut store = state.store.clone();
    let status = tokio::task::spawn_blocking(move || migration.status(&mut store))
        .await
        .map_err(|e| AppError::InternalError(format!("Status task failed: {}", e)))??;

    let last_run = state.last_run.read().await.as_ref().map(|s| LastRun {
        run_id: s.run_id.to_string(),
        finished_at: s.finished_at.to_rfc3339(),
        success_count: s.success_count,
        skipped_count: s.skipped_count,
        warning_count: s.warning_count,
        error_count: s.error_count,
    });

    Ok(Json(StatusResponse {
        running,
        status,
        last_run,
    }))
}

#[derive(Debug, Deserialize)]
struct PreviewParams {
    limit: Option<usize>,
}

/// First rows of a legacy table, as parsed from the dump.
async fn preview_table(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<TablePreview>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);
    let migration = state.migration.clone();
    let preview = tokio::task::spawn_blocking(move || migration.preview(&table, limit))
        .await
        .map_err(|e| AppError::InternalError(format!("Preview task failed: {}", e)))??;
    Ok(Json(preview))
}

/// Health check endpoint (liveness)
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "migrate-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// Error handling

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    Unavailable(String),
    InternalError(String),
}

impl From<MigrationError> for AppError {
    fn from(e: MigrationError) -> Self {
        let message = e.to_string();
        match e {
            MigrationError::UnknownTable(_) => AppError::NotFound(message),
            MigrationError::Parse(ParseError::SourceUnavailable { .. }) => {
                AppError::Unavailable(message)
            }
            MigrationError::Parse(ParseError::NoStatements) => AppError::Unprocessable(message),
            MigrationError::Config(_) | MigrationError::Store(_) => {
                AppError::InternalError(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::InternalError(msg) => {
                tracing::error!("{}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({
            "error": message
        }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_flag_clears_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let raised = RunningFlag::raise(flag.clone());
        assert!(flag.load(Ordering::SeqCst));
        drop(raised);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_running_flag_clears_on_panic() {
        let flag = Arc::new(AtomicBool::new(false));
        let inner = flag.clone();
        let result = std::panic::catch_unwind(move || {
            let _running = RunningFlag::raise(inner);
            panic!("run aborted");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_busy_run_maps_to_conflict() {
        let response = AppError::Conflict("busy".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unknown_table_maps_to_not_found() {
        let err: AppError = MigrationError::UnknownTable("nope".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
