//! # Ingestion Pipeline
//!
//! The HTTP layer powered by Axum: receives one uploaded dataset per
//! request, validates filename, extension, and row shape, then loads the
//! rows into the provisioned table inside a single transaction.
//!
//! ## Endpoints
//!
//! - `GET /` - Landing page with the upload form
//! - `POST /upload` - Multipart dataset upload (form field `geojson`)
//! - `GET /health` - Database connectivity probe
//!
//! ## Validation gates (each a terminal 400 rejection)
//!
//! 1. A file must be present in the `geojson` form field
//! 2. The extension must be `.geojson`
//! 3. The base name must be exactly `DEPARTAMENTOS.geojson`
//! 4. The dataset must contain at least one data row
//! 5. Every row must carry exactly the six expected fields
//!
//! Each upload is persisted under a unique temporary name so concurrent
//! requests never touch each other's files, and is deleted on every
//! outcome, success and rejection alike. Inserts run inside one
//! transaction; a failing insert rolls the whole request back.

use std::path::{Path as StdPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::db::GeoStore;
use crate::error::{GeoError, GeoResult};
use crate::provision::TABLE_NAME;

/// Multipart form field carrying the dataset
pub const UPLOAD_FIELD: &str = "geojson";

/// The single accepted base filename
pub const EXPECTED_FILENAME: &str = "DEPARTAMENTOS.geojson";

/// Required field names for every row, order-insensitive in the file
pub const EXPECTED_FIELDS: [&str; 6] = [
    "OBJECTID",
    "CODDEP",
    "DEPARTAMEN",
    "CAPITAL",
    "FUENTE",
    "GEOMETRY",
];

/// Maximum upload size (100 MB)
const MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// One insert per row; the geometry parameter is GeoJSON text parsed by
/// PostGIS and tagged with SRID 4326.
const INSERT_SQL: &str = "INSERT INTO departamentos \
    (objectid, coddep, departamen, capital, fuente, geometry) \
    VALUES ($1, $2, $3, $4, $5, ST_SetSRID(ST_GeomFromGeoJSON($6), 4326))";

/// Response body for a completed upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub rows_inserted: u64,
}

/// One validated entry of the uploaded dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentRow {
    pub objectid: i32,
    pub coddep: String,
    pub departamen: String,
    pub capital: String,
    pub fuente: String,
    /// GeoJSON multi-polygon geometry text
    pub geometry: String,
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GeoStore>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(store: Arc<GeoStore>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            upload_dir: upload_dir.into(),
        }
    }
}

/// Creates the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(landing_handler))
        .route("/upload", post(upload_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - static landing page with the upload form
async fn landing_handler() -> impl IntoResponse {
    Html(include_str!("../static/index.html"))
}

/// GET /health - database connectivity probe
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "database": "connected"
        })),
        Err(e) => Json(json!({
            "status": "unhealthy",
            "database": "disconnected",
            "error": e.to_string()
        })),
    }
}

/// POST /upload - validate and ingest one dataset file
async fn upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, GeoError> {
    let (file_name, data) = receive_file(multipart).await?;
    info!("Received upload '{}' ({} bytes)", file_name, data.len());

    // The client-supplied name is only ever compared against the fixed
    // expected filename; on disk the upload gets a unique temporary name.
    let saved_path = save_upload(&state.upload_dir, &data).await?;

    // From here on the file exists on disk: every outcome, success or
    // rejection, ends with its deletion.
    let result = process_upload(&state, &saved_path, &file_name).await;
    discard_upload(&saved_path).await;
    let inserted = result?;

    info!("Loaded {} rows into '{}'", inserted, TABLE_NAME);
    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            success: true,
            message: "GeoJSON dataset loaded successfully".to_string(),
            rows_inserted: inserted,
        }),
    ))
}

/// Pulls the dataset out of the multipart request
async fn receive_file(mut multipart: Multipart) -> GeoResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GeoError::InvalidUpload(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| GeoError::InvalidUpload("file field has no name".to_string()))?;

            let data = field
                .bytes()
                .await
                .map_err(|e| GeoError::InvalidUpload(format!("Failed to read file: {}", e)))?;

            return Ok((file_name, data.to_vec()));
        }
    }

    Err(GeoError::MissingFile)
}

/// Persists the upload under the shared upload directory. The name is
/// unique per request: concurrent uploads must never overwrite or delete
/// each other's in-flight files.
async fn save_upload(upload_dir: &StdPath, data: &[u8]) -> GeoResult<PathBuf> {
    fs::create_dir_all(upload_dir).await?;

    let (_, path) = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".geojson")
        .tempfile_in(upload_dir)?
        .keep()
        .map_err(|e| GeoError::Io(e.error))?;

    fs::write(&path, data).await?;
    Ok(path)
}

/// Removes the transient upload; a failure here is logged, not propagated
async fn discard_upload(path: &StdPath) {
    if let Err(e) = fs::remove_file(path).await {
        warn!("Failed to remove uploaded file {}: {}", path.display(), e);
    }
}

/// Runs the remaining validation gates and the transactional insert.
/// Parsing is file I/O plus CSV work over a potentially large upload, so
/// it runs on the blocking pool instead of stalling the async runtime.
async fn process_upload(state: &AppState, path: &StdPath, file_name: &str) -> GeoResult<u64> {
    validate_file_name(file_name)?;

    let parse_path = path.to_path_buf();
    let rows = tokio::task::spawn_blocking(move || parse_rows(&parse_path))
        .await
        .map_err(|e| GeoError::Internal(anyhow::anyhow!("dataset parse task failed: {}", e)))??;

    insert_rows(&state.store, &rows).await
}

/// Gates 2 and 3: extension, then exact base filename
fn validate_file_name(file_name: &str) -> GeoResult<()> {
    let extension = StdPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    if extension.as_deref() != Some("geojson") {
        return Err(GeoError::InvalidExtension(file_name.to_string()));
    }

    if file_name != EXPECTED_FILENAME {
        return Err(GeoError::UnexpectedFilename(file_name.to_string()));
    }

    Ok(())
}

/// Parses the file as delimited tabular data and validates every row
/// against the fixed six-field shape. Rows are fully buffered before any
/// insert is attempted, so a shape failure never leaves partial data.
fn parse_rows(path: &StdPath) -> GeoResult<Vec<DepartmentRow>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

    if records.is_empty() {
        return Err(GeoError::EmptyDataset);
    }

    let indices = expected_field_indices(&headers).ok_or_else(|| GeoError::InvalidRow {
        row: 1,
        reason: format!(
            "field names must be exactly {}, found [{}]",
            EXPECTED_FIELDS.join(", "),
            headers.iter().collect::<Vec<_>>().join(", ")
        ),
    })?;

    let mut rows = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let row = idx + 1;

        if record.len() != EXPECTED_FIELDS.len() {
            return Err(GeoError::InvalidRow {
                row,
                reason: format!(
                    "expected {} fields, found {}",
                    EXPECTED_FIELDS.len(),
                    record.len()
                ),
            });
        }

        let field = |slot: usize| record.get(indices[slot]).unwrap_or_default().to_string();

        let objectid: i32 = record
            .get(indices[0])
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| GeoError::InvalidRow {
                row,
                reason: format!(
                    "OBJECTID '{}' is not an integer",
                    record.get(indices[0]).unwrap_or_default()
                ),
            })?;

        rows.push(DepartmentRow {
            objectid,
            coddep: field(1),
            departamen: field(2),
            capital: field(3),
            fuente: field(4),
            geometry: field(5),
        });
    }

    Ok(rows)
}

/// Maps each expected field to its position in the header row. `None`
/// when the header set is not exactly the six expected names.
fn expected_field_indices(headers: &StringRecord) -> Option<[usize; 6]> {
    if headers.len() != EXPECTED_FIELDS.len() {
        return None;
    }

    let mut indices = [0usize; 6];
    for (slot, name) in EXPECTED_FIELDS.iter().enumerate() {
        indices[slot] = headers.iter().position(|h| h == *name)?;
    }
    Some(indices)
}

/// Inserts all rows in input order inside a single transaction. Any
/// failure aborts the request and rolls the transaction back on drop;
/// no row from a failed request is ever committed.
async fn insert_rows(store: &GeoStore, rows: &[DepartmentRow]) -> GeoResult<u64> {
    let mut client = store.client().await?;
    let tx = client.transaction().await?;
    let stmt = tx.prepare(INSERT_SQL).await?;

    for row in rows {
        tx.execute(
            &stmt,
            &[
                &row.objectid,
                &row.coddep,
                &row.departamen,
                &row.capital,
                &row.fuente,
                &row.geometry,
            ],
        )
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len() as u64)
}
