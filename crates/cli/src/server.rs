//! HTTP surface of the ingestion API.
//!
//! Five JSON endpoints plus two multipart helpers for spreadsheet
//! inspection. The only guarded route is `/ingest/rows`; everything else
//! reveals nothing an operator could not learn from the process itself.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Multipart, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::error;
use serde::Deserialize;
use serde_json::json;
use sheetbridge_audit::AuditStore;
use sheetbridge_crm::CrmClient;
use sheetbridge_ingest::{IngestError, IngestPipeline};
use sheetbridge_protocol::{ErrorDetail, IngestRequest};
use sheetbridge_tabular::{decode_bytes, TableFormat};

use crate::security::BridgeSecret;
use crate::settings::Settings;

/// Longest prefix of the mapping text echoed back by `/preview`.
const MAPPING_SAMPLE_CHARS: usize = 120;

/// Shared state behind the API routes.
pub struct AppState {
    settings: Settings,
    secret: BridgeSecret,
    pipeline: IngestPipeline,
}

impl AppState {
    pub fn new(settings: Settings, pipeline: IngestPipeline) -> Self {
        let secret = BridgeSecret::new(settings.bridge_secret.clone());
        Self {
            settings,
            secret,
            pipeline,
        }
    }
}

/// Builds the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/env-check",
            get({
                let state = state.clone();
                move || env_check(state.clone())
            }),
        )
        .route(
            "/logs/recent",
            get({
                let state = state.clone();
                move |query| logs_recent(query, state.clone())
            }),
        )
        .route(
            "/ingest/rows",
            post({
                let state = state.clone();
                move |headers, body| ingest_rows(headers, body, state.clone())
            }),
        )
        .route("/preview", post(preview))
        .route("/upload", post(upload))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "sheetbridge API running" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Reports which credentials are configured without revealing their values.
async fn env_check(state: Arc<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "has_hubspot_token": state.settings.hubspot_token.is_some(),
        "has_bridge_secret": state.settings.has_real_secret(),
    }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default = "default_log_limit")]
    limit: u32,
}

const fn default_log_limit() -> u32 {
    30
}

async fn logs_recent(query: Query<LogsQuery>, state: Arc<AppState>) -> Response {
    match state.pipeline.store().recent(query.limit).await {
        Ok(events) => Json(json!({ "ok": true, "events": events })).into_response(),
        Err(err) => {
            error!("Could not list ingestion events: {err}");
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not list events: {err}"),
            )
        }
    }
}

async fn ingest_rows(headers: HeaderMap, body: Bytes, state: Arc<AppState>) -> Response {
    if !state.secret.matches(&headers) {
        return error_reply(StatusCode::UNAUTHORIZED, "Invalid secret");
    }

    let request: IngestRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_reply(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {err}"),
            );
        }
    };

    match state.pipeline.ingest_row(&request).await {
        Ok(outcome) => Json(outcome.into_reply()).into_response(),
        Err(err) => {
            error!("Row ingestion failed: {err}");
            error_reply(ingest_error_status(&err), err.to_string())
        }
    }
}

/// A missing token is the caller's configuration problem; everything the
/// CRM itself botches maps onto 502.
fn ingest_error_status(err: &IngestError) -> StatusCode {
    match err {
        IngestError::Crm(crm) if crm.is_upstream() => StatusCode::BAD_GATEWAY,
        IngestError::Crm(_) => StatusCode::BAD_REQUEST,
        IngestError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorDetail::new(detail))).into_response()
}

/// One file part pulled out of a multipart body.
struct UploadedFile {
    name: String,
    bytes: Bytes,
}

/// Collects the `file` and `mapping` parts; unknown parts are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<(Option<UploadedFile>, String), String> {
    let mut file = None;
    let mut mapping = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(format!("Malformed upload: {err}")),
        };
        // Names borrow from the field, so copy them out before consuming it.
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| format!("Malformed upload: {err}"))?;
                file = Some(UploadedFile { name, bytes });
            }
            Some("mapping") => {
                mapping = field
                    .text()
                    .await
                    .map_err(|err| format!("Malformed upload: {err}"))?;
            }
            _ => {}
        }
    }

    Ok((file, mapping))
}

/// Echoes upload metadata so operators can sanity-check a file and mapping
/// before wiring up the bridge.
async fn preview(multipart: Multipart) -> Response {
    let (file, mapping) = match read_upload(multipart).await {
        Ok(parts) => parts,
        Err(detail) => return upload_error(detail),
    };
    let Some(file) = file else {
        return upload_error("Missing file field");
    };

    let sample: String = mapping.chars().take(MAPPING_SAMPLE_CHARS).collect();
    Json(json!({
        "ok": true,
        "filename": file.name,
        "bytes": file.bytes.len(),
        "mapping_sample": sample,
    }))
    .into_response()
}

/// Parses an uploaded spreadsheet and returns its header row.
async fn upload(multipart: Multipart) -> Response {
    let (file, _) = match read_upload(multipart).await {
        Ok(parts) => parts,
        Err(detail) => return upload_error(detail),
    };
    let Some(file) = file else {
        return upload_error("Missing file field");
    };

    let Ok(format) = TableFormat::from_file_name(&file.name) else {
        return upload_error("Unsupported file type");
    };
    let table = match decode_bytes(format, &file.bytes) {
        Ok(table) => table,
        Err(err) => return upload_error(format!("Error reading file: {err}")),
    };

    Json(json!({
        "filename": file.name,
        "preview": { "columns": table.headers },
    }))
    .into_response()
}

fn upload_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// Opens the audit store, assembles the pipeline and serves the API until
/// the process is stopped.
pub async fn serve(settings: Settings, bind: &str) -> anyhow::Result<()> {
    let store = AuditStore::open(&settings.db_path).await.with_context(|| {
        format!(
            "could not open audit store at {}",
            settings.db_path.display()
        )
    })?;
    let crm = CrmClient::new(settings.crm_config());
    let pipeline = IngestPipeline::new(store, crm);
    let state = Arc::new(AppState::new(settings, pipeline));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("could not bind {bind}"))?;
    println!("Serving ingestion API on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}
