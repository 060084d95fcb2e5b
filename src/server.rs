// Upload Server
// POST /upload-excel plus read-back endpoints, served with Axum

use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::db::{get_all_students, get_student_by_prn, StudentRecord, StudentStore};
use crate::error::{IngestError, IngestResult, IMPORT_SUCCESS_MESSAGE, NO_FILE_MESSAGE};
use crate::ingest::{ImportPipeline, TempUpload};
use crate::parser::SpreadsheetParser;
use crate::reconciliation::ReconciliationEngine;

/// Multipart field carrying the spreadsheet
pub const UPLOAD_FIELD: &str = "file";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<StudentStore>>,
    pub pipeline: Arc<ImportPipeline>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: StudentStore, config: AppConfig) -> Self {
        let engine = ReconciliationEngine::new().with_commit_policy(config.commit_policy);

        Self {
            db: Arc::new(Mutex::new(store)),
            pipeline: Arc::new(ImportPipeline::new(SpreadsheetParser::new(), engine)),
            config: Arc::new(config),
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_client_error() {
            tracing::warn!(error = %self, status = %status, "Upload rejected");
        } else {
            tracing::error!(error = %self, "Error processing file");
        }

        (status, self.public_message()).into_response()
    }
}

/// The guard is released when it goes out of scope, whatever the outcome.
/// A panic while it was held leaves the connection usable, so poisoning is
/// ignored.
fn lock_store(db: &Mutex<StudentStore>) -> MutexGuard<'_, StudentStore> {
    db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run blocking store work off the async runtime
async fn with_store<T, F>(db: Arc<Mutex<StudentStore>>, work: F) -> IngestResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut StudentStore) -> IngestResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&mut lock_store(&db)))
        .await
        .unwrap_or_else(|err| Err(IngestError::Internal(format!("store task failed: {}", err))))
}

// ============================================================================
// Upload Handler
// ============================================================================

/// POST /upload-excel - import the first sheet of the uploaded spreadsheet
async fn upload_excel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::error!(error = %rejection, "No file uploaded: request is not multipart");
            return (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE).into_response();
        }
    };

    let upload = match receive_file(&state.config.upload_dir, multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            tracing::error!("No file uploaded");
            return (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE).into_response();
        }
        Err(err) => return err.into_response(),
    };
    tracing::info!(path = %upload.path().display(), "File received");

    let db = Arc::clone(&state.db);
    let pipeline = Arc::clone(&state.pipeline);

    let outcome = tokio::task::spawn_blocking(move || {
        // Parse and validate before taking the store
        let result = pipeline.prepare_path(upload.path()).and_then(|records| {
            let mut store = lock_store(&db);
            pipeline.reconcile(&mut store, &records)
        });
        drop(upload);
        result
    })
    .await
    .unwrap_or_else(|err| Err(IngestError::Internal(format!("import task failed: {}", err))));

    match outcome {
        Ok(report) => {
            tracing::info!(summary = %report.summary(), "Excel data inserted/updated");
            (StatusCode::OK, IMPORT_SUCCESS_MESSAGE).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Stage the `file` part on disk
///
/// `Ok(None)` when no part named `file` carries a file name. A body that
/// cannot be read (too large, truncated, malformed) is an error.
async fn receive_file(upload_dir: &FsPath, mut multipart: Multipart) -> IngestResult<Option<TempUpload>> {
    while let Some(field) = multipart.next_field().await? {
        // Plain form fields have no file name, even when called `file`
        if field.name() != Some(UPLOAD_FIELD) || field.file_name().is_none() {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(|name| FsPath::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        let data = field.bytes().await?;

        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|source| IngestError::FileSystem {
                path: upload_dir.to_path_buf(),
                source,
            })?;

        let path = upload_dir.join(format!(
            "{}-{}{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension
        ));
        tokio::fs::write(&path, &data)
            .await
            .map_err(|source| IngestError::FileSystem {
                path: path.clone(),
                source,
            })?;

        return Ok(Some(TempUpload::new(path)));
    }

    Ok(None)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/students - All stored students, ordered by PRN
async fn list_students(State(state): State<AppState>) -> Response {
    match with_store(state.db, |store| Ok(get_all_students(store.connection())?)).await {
        Ok(students) => (StatusCode::OK, Json(ApiResponse::ok(students))).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Error getting students");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<StudentRecord>>::error("failed to load students")),
            )
                .into_response()
        }
    }
}

/// GET /api/students/:prn - One student
async fn get_student(State(state): State<AppState>, Path(prn): Path<String>) -> Response {
    let lookup = prn.clone();
    match with_store(state.db, move |store| Ok(get_student_by_prn(store.connection(), &lookup)?)).await {
        Ok(Some(student)) => (StatusCode::OK, Json(ApiResponse::ok(student))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<StudentRecord>::error("student not found")),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, prn = %prn, "Error getting student");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<StudentRecord>::error("failed to load student")),
            )
                .into_response()
        }
    }
}

/// GET / - Upload form
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/students", get(list_students))
        .route("/students/:prn", get(get_student));

    Router::new()
        .route("/", get(serve_index))
        .route("/upload-excel", post(upload_excel))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
