#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use axum::response::Response;
use axum::Router;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;
use tower::ServiceExt;

use student_import::server::{build_router, AppState};
use student_import::{AppConfig, StudentStore, REQUIRED_FIELDS};

pub const BOUNDARY: &str = "student-import-test-boundary";

/// Router plus handles the assertions need.
///
/// The temp dir lives as long as the struct so uploads have somewhere to go.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<Mutex<StudentStore>>,
    pub upload_dir: TempDir,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

/// Same as [`build_test_app`] with a config tweak applied first
pub fn build_test_app_with<F>(configure: F) -> TestApp
where
    F: FnOnce(&mut AppConfig),
{
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        upload_dir: upload_dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    configure(&mut config);

    let state = AppState::new(StudentStore::open_in_memory().unwrap(), config);
    let db = Arc::clone(&state.db);

    TestApp {
        router: build_router(state),
        db,
        upload_dir,
    }
}

impl TestApp {
    /// Files left behind in the upload directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

/// Students sheet with the standard header; a numeric dob becomes a number cell
pub fn student_workbook(rows: &[[&str; 7]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in REQUIRED_FIELDS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }

    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            if value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(number) if REQUIRED_FIELDS[col as usize] == "dob" => {
                    worksheet.write_number(r, col, number).unwrap();
                }
                _ => {
                    worksheet.write_string(r, col, *value).unwrap();
                }
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// multipart/form-data body with one file part
pub fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// multipart/form-data body with a single text field and no file
pub fn multipart_text_only(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"\r\n\r\n{v}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        v = value
    )
    .into_bytes()
}

pub async fn upload(app: &TestApp, body: Vec<u8>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload-excel")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
