//! Integration tests for the upload endpoint and the read-back API.

#![cfg(feature = "server")]

mod common;

use axum::http::StatusCode;
use common::{
    body_json, body_text, build_test_app, build_test_app_with, get, multipart_body,
    multipart_text_only, student_workbook, upload,
};
use student_import::error::{
    IMPORT_SUCCESS_MESSAGE, INVALID_DATA_MESSAGE, NO_FILE_MESSAGE, PROCESSING_FAILED_MESSAGE,
    UPLOAD_TOO_LARGE_MESSAGE,
};
use student_import::{get_student_by_prn, verify_count};

// ---------------------------------------------------------------------------
// Test: a valid sheet is stored with its dob normalized
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_inserts_rows_and_normalizes_dob() {
    let app = build_test_app();
    let sheet = student_workbook(&[
        ["1", "A", "X", "CS", "M", "44197", "P1"],
        ["2", "B", "X", "IT", "F", "36526", "P2"],
    ]);

    let response = upload(&app, multipart_body("file", "students.xlsx", &sheet)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, IMPORT_SUCCESS_MESSAGE);

    let store = app.db.lock().unwrap();
    assert_eq!(verify_count(store.connection()).unwrap(), 2);
    let p1 = get_student_by_prn(store.connection(), "P1").unwrap().unwrap();
    assert_eq!(p1.date_of_birth, "2021-01-01");
    assert_eq!(p1.name, "A");
    let p2 = get_student_by_prn(store.connection(), "P2").unwrap().unwrap();
    assert_eq!(p2.date_of_birth, "2000-01-01");
}

// ---------------------------------------------------------------------------
// Test: re-uploading the same PRN updates rather than duplicates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reupload_updates_existing_prn() {
    let app = build_test_app();

    let first = student_workbook(&[["1", "A", "X", "CS", "M", "44197", "P1"]]);
    let response = upload(&app, multipart_body("file", "a.xlsx", &first)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let second = student_workbook(&[["1", "A", "X", "CS", "M", "44198", "P1"]]);
    let response = upload(&app, multipart_body("file", "b.xlsx", &second)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let store = app.db.lock().unwrap();
    assert_eq!(verify_count(store.connection()).unwrap(), 1);
    let p1 = get_student_by_prn(store.connection(), "P1").unwrap().unwrap();
    assert_eq!(p1.date_of_birth, "2021-01-02");
}

// ---------------------------------------------------------------------------
// Test: no file part is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let app = build_test_app();

    let response = upload(&app, multipart_text_only("comment", "hello")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, NO_FILE_MESSAGE);
}

#[tokio::test]
async fn file_under_wrong_field_name_is_bad_request() {
    let app = build_test_app();
    let sheet = student_workbook(&[["1", "A", "X", "CS", "M", "44197", "P1"]]);

    let response = upload(&app, multipart_body("spreadsheet", "a.xlsx", &sheet)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn text_field_named_file_is_bad_request() {
    let app = build_test_app();

    let response = upload(&app, multipart_text_only("file", "hello")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, NO_FILE_MESSAGE);
    assert_eq!(app.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// Test: bodies over the upload limit are refused, not mistaken for "no file"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = build_test_app_with(|config| config.max_upload_bytes = 64);
    let sheet = student_workbook(&[["1", "A", "X", "CS", "M", "44197", "P1"]]);

    let response = upload(&app, multipart_body("file", "students.xlsx", &sheet)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_text(response).await, UPLOAD_TOO_LARGE_MESSAGE);

    let store = app.db.lock().unwrap();
    assert_eq!(verify_count(store.connection()).unwrap(), 0);
    drop(store);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn truncated_multipart_body_is_server_error() {
    let app = build_test_app();
    let sheet = student_workbook(&[["1", "A", "X", "CS", "M", "44197", "P1"]]);
    let mut body = multipart_body("file", "students.xlsx", &sheet);
    // Drop the closing boundary so the file part never ends
    body.truncate(body.len() - 40);

    let response = upload(&app, body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, PROCESSING_FAILED_MESSAGE);
    assert_eq!(app.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// Test: a row missing a required field rejects the whole batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn row_missing_prn_writes_nothing() {
    let app = build_test_app();
    let sheet = student_workbook(&[
        ["1", "A", "X", "CS", "M", "44197", "P1"],
        ["2", "B", "X", "CS", "F", "44198", ""],
    ]);

    let response = upload(&app, multipart_body("file", "students.xlsx", &sheet)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, INVALID_DATA_MESSAGE);

    let store = app.db.lock().unwrap();
    assert_eq!(verify_count(store.connection()).unwrap(), 0);
    drop(store);
    assert_eq!(app.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// Test: an unreadable workbook is a 500 and the temp file is still removed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn garbage_file_is_server_error() {
    let app = build_test_app();

    let response = upload(
        &app,
        multipart_body("file", "broken.xlsx", b"this is not a workbook"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, PROCESSING_FAILED_MESSAGE);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn upload_dir_is_empty_after_success() {
    let app = build_test_app();
    let sheet = student_workbook(&[["1", "A", "X", "CS", "M", "44197", "P1"]]);

    let response = upload(&app, multipart_body("file", "students.xlsx", &sheet)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn csv_upload_is_accepted() {
    let app = build_test_app();
    let csv = b"rollno,name,class,branch,gender,dob,prn\n7,Asha,SE,CS,F,44197,P7\n";

    let response = upload(&app, multipart_body("file", "students.csv", csv)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let store = app.db.lock().unwrap();
    let p7 = get_student_by_prn(store.connection(), "P7").unwrap().unwrap();
    assert_eq!(p7.date_of_birth, "2021-01-01");
}

// ---------------------------------------------------------------------------
// Test: read-back API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok() {
    let app = build_test_app();

    let response = get(&app, "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "OK");
}

#[tokio::test]
async fn students_are_listed_after_upload() {
    let app = build_test_app();
    let sheet = student_workbook(&[
        ["2", "B", "X", "CS", "F", "44198", "P2"],
        ["1", "A", "X", "CS", "M", "44197", "P1"],
    ]);
    upload(&app, multipart_body("file", "students.xlsx", &sheet)).await;

    let response = get(&app, "/api/students").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let students = json["data"].as_array().unwrap();
    assert_eq!(students.len(), 2);
    assert_eq!(students[0]["prn"], "P1");
    assert_eq!(students[0]["dob"], "2021-01-01");
    assert_eq!(students[1]["rollno"], "2");
}

#[tokio::test]
async fn unknown_student_is_not_found() {
    let app = build_test_app();

    let response = get(&app, "/api/students/NOPE").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn index_serves_upload_form() {
    let app = build_test_app();

    let response = get(&app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("upload-excel"));
}
