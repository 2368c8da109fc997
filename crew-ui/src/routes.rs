//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use crew::io::documents::ConfigDocKind;
use crew::io::files::list_files;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::run::{build_request, start_run};
use crate::state::{AppState, RunSnapshot};

/// Error returned by API handlers as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        warn!(err = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/config/{doc}", get(get_config).put(put_config))
        .route("/credential", get(get_credential).post(post_credential))
        .route("/run", get(get_run).post(post_run))
        .route("/report", get(get_report))
        .route("/report/download", get(download_report))
        .route("/files", get(get_files))
}

async fn health() -> &'static str {
    "ok"
}

fn parse_doc(doc: &str) -> ApiResult<ConfigDocKind> {
    doc.parse()
        .map_err(|e: anyhow::Error| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))
}

/// GET /api/config/{doc} - raw document text (empty if missing).
async fn get_config(State(state): State<AppState>, Path(doc): Path<String>) -> ApiResult<String> {
    let kind = parse_doc(&doc)?;
    state.document(kind).load().map_err(ApiError::internal)
}

#[derive(Serialize)]
struct SavedResponse {
    doc: ConfigDocKind,
    bytes: usize,
}

/// PUT /api/config/{doc} - overwrite the document with the request body.
async fn put_config(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    body: String,
) -> ApiResult<Json<SavedResponse>> {
    let kind = parse_doc(&doc)?;
    let _guard = state.save_lock.lock().await;
    state.document(kind).save(&body).map_err(ApiError::internal)?;
    info!(doc = %kind, bytes = body.len(), "config document saved");
    Ok(Json(SavedResponse {
        doc: kind,
        bytes: body.len(),
    }))
}

#[derive(Serialize)]
struct CredentialStatus {
    present: bool,
    persisted: bool,
}

/// GET /api/credential - whether a key is set. The key itself is never returned.
async fn get_credential(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(CredentialStatus {
        present: state.credential().is_some(),
        persisted: state.credential_file().path().exists(),
    })
}

#[derive(Deserialize)]
struct CredentialUpdate {
    api_key: String,
    #[serde(default)]
    persist: bool,
}

/// POST /api/credential - set the key for future runs, optionally writing `.env`.
async fn post_credential(
    State(state): State<AppState>,
    Json(update): Json<CredentialUpdate>,
) -> ApiResult<Json<CredentialStatus>> {
    let persisted = update.persist && !update.api_key.is_empty();
    if persisted {
        state
            .credential_file()
            .save(&update.api_key)
            .map_err(ApiError::internal)?;
        info!("credential saved to .env");
    }
    state.set_credential(Some(update.api_key));
    Ok(Json(CredentialStatus {
        present: state.credential().is_some(),
        persisted,
    }))
}

/// GET /api/run - current or last run.
async fn get_run(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.snapshot())
}

/// POST /api/run - launch the crew tool; 409 while another run is active.
async fn post_run(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<RunSnapshot>)> {
    let request = build_request(&state).map_err(ApiError::internal)?;
    if !start_run(&state, request) {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "a run is already in progress",
        ));
    }
    Ok((StatusCode::ACCEPTED, Json(state.snapshot())))
}

#[derive(Serialize)]
struct ReportResponse {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
    truncated: bool,
}

/// GET /api/report - bounded preview, or `exists: false` before the first report.
async fn get_report(State(state): State<AppState>) -> ApiResult<Json<ReportResponse>> {
    let preview = state.report().preview().map_err(ApiError::internal)?;
    Ok(Json(match preview {
        Some(preview) => ReportResponse {
            exists: true,
            truncated: preview.truncated,
            preview: Some(preview.text),
        },
        None => ReportResponse {
            exists: false,
            preview: None,
            truncated: false,
        },
    }))
}

/// GET /api/report/download - full report as a `report.md` attachment.
async fn download_report(State(state): State<AppState>) -> ApiResult<Response> {
    let export = state
        .report()
        .download()
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no report generated yet"))?;
    let headers = [
        (
            header::CONTENT_TYPE,
            format!("{}; charset=utf-8", export.mime_type),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.file_name),
        ),
    ];
    Ok((headers, export.contents).into_response())
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

/// GET /api/files - files in the project root.
async fn get_files(State(state): State<AppState>) -> ApiResult<Json<FilesResponse>> {
    let files = list_files(&state.paths.root, &state.config.listing.exclude)
        .map_err(ApiError::internal)?;
    Ok(Json(FilesResponse { files }))
}
