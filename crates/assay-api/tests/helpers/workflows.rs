//! Workflow helpers for integration tests (upload → process → download).

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;

pub const SAMPLE_CSV: &str = "2theta,intensity\n10.0,120\n10.5,340\n11.0,95\n";

/// Upload `content` as `file_name` and return the response body.
pub async fn upload_csv(client: &TestServer, file_name: &str, content: &str) -> serde_json::Value {
    let part = Part::bytes(bytes::Bytes::from(content.to_string()))
        .file_name(file_name.to_string())
        .mime_type("text/csv");
    let multipart = MultipartForm::new().add_part("file", part);

    let response = client.post("/upload").multipart(multipart).await;
    assert_eq!(response.status_code(), 200);
    response.json()
}

/// Stored name from an upload response.
pub fn stored_name(upload: &serde_json::Value) -> String {
    upload["file"]["stored_name"]
        .as_str()
        .expect("Expected 'file.stored_name' in upload response")
        .to_string()
}

/// Upload a sample file and return its stored name.
pub async fn upload_sample(client: &TestServer) -> String {
    let upload = upload_csv(client, "scan.csv", SAMPLE_CSV).await;
    stored_name(&upload)
}
