//! HTTP server for the ledger pipeline.
//!
//! # API Endpoints
//!
//! | Method | Path                                    | Description                      |
//! |--------|-----------------------------------------|----------------------------------|
//! | GET    | `/health`                               | Health check                     |
//! | POST   | `/api/upload`                           | Upload a ledger export           |
//! | GET    | `/api/jobs`                             | List stored jobs                 |
//! | GET    | `/api/jobs/{job_id}`                    | Job manifest                     |
//! | GET    | `/api/jobs/{job_id}/charts`             | Dashboard chart data             |
//! | GET    | `/api/jobs/{job_id}/artifacts/{name}`   | Download one artifact            |
//! | GET    | `/api/logs`                             | SSE stream for real-time logs    |
//!
//! The upload form takes a `file` field, plus optional `chart` (chart of
//! accounts JSON) and `granularity` (`year`, `quarter` or `month`) fields.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, UploadResponse};
use crate::chart::ChartOfAccounts;
use crate::config::AppConfig;
use crate::error::{PipelineError, ServerError, ServerResult, StoreError};
use crate::export::ChartData;
use crate::models::Granularity;
use crate::store::{ArtifactStore, JobManifest};
use crate::transform::pipeline::{run_bytes, PipelineOptions};

type ApiError = (StatusCode, Json<Value>);

/// Shared, read-only server state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: ArtifactStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = config.store();
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_ledger))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{job_id}", get(job_manifest))
        .route("/api/jobs/{job_id}/charts", get(job_charts))
        .route("/api/jobs/{job_id}/artifacts/{artifact}", get(download_artifact))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config);

    tracing::info!(%addr, results = %state.store.root().display(), "ledgerflow server listening");
    tracing::info!("POST /api/upload - Upload ledger export");
    tracing::info!("GET  /api/jobs/{{job_id}} - Job manifest, charts and artifacts");
    tracing::info!("GET  /api/logs - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ledgerflow",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "jobs": "GET /api/jobs/{job_id}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged receivers skip missed entries
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Map an error to its HTTP status and JSON body.
fn error_reply(err: ServerError) -> ApiError {
    let (status, kind) = match &err {
        ServerError::Pipeline(e) => {
            let kind = match e {
                PipelineError::Csv(_) => "csv",
                PipelineError::SchemaMismatch { .. } => "schema_mismatch",
                PipelineError::EmptyInput { .. } => "empty_input",
                PipelineError::Chart(_) => "chart",
                PipelineError::Reconciliation { .. } => "reconciliation",
                PipelineError::Export(_) => "export",
            };
            let status = if e.is_input_error() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, kind)
        }
        ServerError::Store(StoreError::InvalidJobId(_)) => (StatusCode::BAD_REQUEST, "invalid_job_id"),
        ServerError::Store(StoreError::JobNotFound(_)) => (StatusCode::NOT_FOUND, "job_not_found"),
        ServerError::Store(StoreError::ArtifactNotFound(_)) => {
            (StatusCode::NOT_FOUND, "artifact_not_found")
        }
        ServerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    if status.is_server_error() {
        tracing::error!(%err, "request failed");
    }
    (status, Json(error_response(kind, &err.to_string())))
}

/// Fields of the upload form
struct UploadForm {
    file: Vec<u8>,
    file_name: Option<String>,
    chart: Option<Vec<u8>>,
    granularity: Option<Granularity>,
}

async fn read_upload_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut file = None;
    let mut file_name = None;
    let mut chart = None;
    let mut granularity = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let read_error = |e: axum::extract::multipart::MultipartError| {
            ServerError::BadRequest(format!("Read error on field '{}': {}", name, e))
        };

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                file = Some(field.bytes().await.map_err(read_error)?.to_vec());
            }
            "chart" => {
                let bytes = field.bytes().await.map_err(read_error)?;
                if !bytes.iter().all(u8::is_ascii_whitespace) {
                    chart = Some(bytes.to_vec());
                }
            }
            "granularity" => {
                let text = field.text().await.map_err(read_error)?;
                if !text.trim().is_empty() {
                    granularity = Some(text.parse::<Granularity>().map_err(ServerError::BadRequest)?);
                }
            }
            _ => {}
        }
    }

    Ok(UploadForm {
        file: file.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?,
        file_name,
        chart,
        granularity,
    })
}

/// Upload endpoint: run the pipeline and store its artifacts
async fn upload_ledger(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_upload_form(multipart).await.map_err(error_reply)?;

    log_info(format!(
        "New upload: {} ({} bytes)",
        form.file_name.as_deref().unwrap_or("unknown"),
        form.file.len()
    ));

    let options = PipelineOptions {
        granularity: form.granularity.unwrap_or(state.config.granularity),
    };
    let config = Arc::clone(&state.config);
    let store = state.store.clone();

    let result = tokio::task::spawn_blocking(move || -> ServerResult<UploadResponse> {
        // Each request gets its own chart
        let chart = match &form.chart {
            Some(json) => {
                let json = String::from_utf8_lossy(json);
                ChartOfAccounts::from_json(&json).map_err(PipelineError::from)?
            }
            None => config.load_chart().map_err(PipelineError::from)?,
        };

        let report = run_bytes(&form.file, &chart, &options)?;
        let manifest = store.save_report(&report, &config.writer(), form.file_name.as_deref())?;
        Ok(UploadResponse::new(&report, &manifest))
    })
    .await
    .map_err(|e| error_reply(ServerError::Internal(format!("Pipeline task failed: {}", e))))?;

    match result {
        Ok(response) => {
            log_info(format!("Job {} stored", response.job_id));
            Ok(Json(response))
        }
        Err(err) => {
            log_error(err.to_string());
            Err(error_reply(err))
        }
    }
}

async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobManifest>>, ApiError> {
    state
        .store
        .list()
        .map(Json)
        .map_err(|e| error_reply(e.into()))
}

async fn job_manifest(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobManifest>, ApiError> {
    state
        .store
        .load_manifest(&job_id)
        .map(Json)
        .map_err(|e| error_reply(e.into()))
}

async fn job_charts(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ChartData>, ApiError> {
    state
        .store
        .load_charts(&job_id)
        .map(Json)
        .map_err(|e| error_reply(e.into()))
}

async fn download_artifact(
    State(state): State<AppState>,
    Path((job_id, artifact)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (path, info) = state
        .store
        .artifact_path(&job_id, &artifact)
        .map_err(|e| error_reply(e.into()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| error_reply(StoreError::Io(e).into()))?;

    let disposition = format!("attachment; filename=\"{}\"", info.file);
    Ok((
        [
            (header::CONTENT_TYPE, info.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
