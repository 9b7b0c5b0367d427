//! Test helpers: build AppState and router for integration tests.
//!
//! Each test app gets its own temp directory holding the uploads and outputs
//! directories plus a shell script standing in for the analysis step. The
//! script is run as `sh <script> <input> <image> <document>`.
//!
//! Run from workspace root: `cargo test -p assay-api`.

#![allow(dead_code)]

pub mod workflows;

use assay_api::setup::build_app;
use assay_api::AppState;
use assay_core::{Config, PipelineConfig};
use axum_test::TestServer;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Writes both artifacts and exits 0.
pub const WRITES_BOTH: &str =
    "echo \"processing $1\"\necho image > \"$2\"\necho document > \"$3\"\n";

/// Same as [`WRITES_BOTH`] but takes a second first.
pub const SLOW_WRITES_BOTH: &str =
    "sleep 1\necho image > \"$2\"\necho document > \"$3\"\n";

/// Writes only the image.
pub const WRITES_IMAGE_ONLY: &str = "echo image > \"$2\"\n";

/// Fails the way a script rejecting its input would.
pub const EXITS_TWO: &str = "echo 'unexpected column header' >&2\nexit 2\n";

/// Upload ceiling used by test apps.
pub const TEST_MAX_UPLOAD_BYTES: u64 = 64 * 1024;

/// Test application: server, shared state and owned temp directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn uploads_dir(&self) -> &Path {
        self.state.paths.uploads()
    }

    pub fn outputs_dir(&self) -> &Path {
        self.state.paths.outputs()
    }
}

/// Setup test app whose analysis step succeeds.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_script(WRITES_BOTH).await
}

/// Setup test app running `script` as the analysis step.
pub async fn setup_test_app_with_script(script: &str) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let script_path = temp_dir.path().join("analysis.sh");
    std::fs::write(&script_path, script).expect("Failed to write analysis script");

    let config = create_test_config(temp_dir.path(), &script_path);
    let (state, router) = build_app(config).await.expect("Failed to build app");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

fn create_test_config(root: &Path, script: &Path) -> Config {
    Config::new(PipelineConfig {
        upload_dir: root.join("uploads"),
        output_dir: root.join("outputs"),
        max_upload_size_bytes: TEST_MAX_UPLOAD_BYTES,
        analysis_program: "sh".to_string(),
        analysis_args: vec![script.display().to_string()],
        analysis_timeout_secs: 30,
        ..PipelineConfig::default()
    })
}

/// Names of the entries currently in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|e| {
            e.expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
