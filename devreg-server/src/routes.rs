use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use devreg_sync::module::export::{timestamped_export_path, ExportOutcome};
use devreg_sync::module::pipeline::{Pipeline, RunOptions};

pub struct AppState {
    pipeline: Pipeline,
    export_dir: PathBuf,
    /// Serializes pipeline runs; overlapping requests queue here
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, export_dir: PathBuf) -> Self {
        Self {
            pipeline,
            export_dir,
            run_lock: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/export/csv", get(export_csv))
        .with_state(state)
}

/// Static status text
async fn status() -> impl IntoResponse {
    (StatusCode::OK, "Device registry sync is running. GET /export/csv to sync and download.")
}

fn server_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export devices").into_response()
}

/// Run the whole pipeline, then hand the fresh export back as a download.
/// The timestamped file is deleted once it has been read.
async fn export_csv(State(state): State<Arc<AppState>>) -> Response {
    let _run = state.run_lock.lock().await;

    let options = RunOptions {
        export_path: timestamped_export_path(&state.export_dir, &Local::now()),
        preview_approved: false,
    };
    info!("Export requested, running sync into {:?}", options.export_path);

    let report = match state.pipeline.run(&options).await {
        Ok(report) => report,
        Err(e) => {
            error!("Sync for export failed: {:#}", e);
            return server_error();
        }
    };

    let (path, count) = match report.export {
        Some(ExportOutcome::Written { path, count }) => (path, count),
        Some(ExportOutcome::Empty) => {
            return (StatusCode::NOT_FOUND, "No device records to export").into_response();
        }
        None => return server_error(),
    };

    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to read export {:?}: {}", path, e);
            return server_error();
        }
    };
    // Served exports are one-shot; the response body is the only copy
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to remove served export {:?}: {}", path, e);
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "devices.csv".to_string());
    info!("Serving {} devices as {}", count, filename);

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use devreg_sync::config::PipelineConfig;
    use devreg_sync::module::openfda::{Category, FetchError, PageRequest, RawRecord, RecordSource};
    use devreg_sync::module::store::DeviceStore;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct StubSource {
        k510: Vec<RawRecord>,
    }

    #[async_trait]
    impl RecordSource for StubSource {
        async fn fetch_page(&self, page: PageRequest<'_>) -> Result<Vec<RawRecord>, FetchError> {
            match page.category {
                Category::Pma => Err(FetchError::Other("unavailable".to_string())),
                Category::K510 => Ok(self
                    .k510
                    .iter()
                    .skip(page.skip)
                    .take(page.limit)
                    .cloned()
                    .collect()),
            }
        }
    }

    fn app(store: DeviceStore, k510: Vec<RawRecord>, export_dir: PathBuf) -> Router {
        let pipeline = Pipeline::new(
            Arc::new(StubSource { k510 }),
            Arc::new(store),
            PipelineConfig::default(),
        );
        router(Arc::new(AppState::new(pipeline, export_dir)))
    }

    fn k510(number: &str) -> RawRecord {
        json!({
            "k_number": number,
            "device_name": "Pulse Oximeter",
            "decision_code": "SE",
            "decision_date": "2024-03-01",
            "applicant": "Acme Corp",
            "product_code": "DQA"
        })
    }

    async fn send_get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_page() {
        let dir = TempDir::new().unwrap();
        let app = app(DeviceStore::open_in_memory().unwrap(), vec![], dir.path().to_path_buf());

        let response = send_get(app, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("running"));
    }

    #[tokio::test]
    async fn test_export_download() {
        let dir = TempDir::new().unwrap();
        let app = app(
            DeviceStore::open_in_memory().unwrap(),
            vec![k510("K1"), k510("K2")],
            dir.path().join("exports"),
        );

        let response = send_get(app, "/export/csv").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"devices_"));
        assert!(disposition.ends_with(".csv\""));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("submissionNumber,"));
        assert!(lines[1].starts_with("K1,"));
    }

    #[tokio::test]
    async fn test_served_exports_do_not_accumulate() {
        let dir = TempDir::new().unwrap();
        let export_dir = dir.path().join("exports");
        let app = app(
            DeviceStore::open_in_memory().unwrap(),
            vec![k510("K1")],
            export_dir.clone(),
        );

        let first = send_get(app.clone(), "/export/csv").await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = send_get(app, "/export/csv").await;
        assert_eq!(second.status(), StatusCode::OK);

        assert_eq!(std::fs::read_dir(&export_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = app(DeviceStore::open_in_memory().unwrap(), vec![], dir.path().to_path_buf());

        let response = send_get(app, "/export/csv").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_broken_store_is_server_error() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("devices.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();
        let app = app(DeviceStore::open(&db_path).unwrap(), vec![k510("K1")], dir.path().to_path_buf());

        let response = send_get(app, "/export/csv").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_export_write_failure_is_server_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("exports");
        std::fs::write(&not_a_dir, "file").unwrap();
        let app = app(DeviceStore::open_in_memory().unwrap(), vec![k510("K1")], not_a_dir);

        let response = send_get(app, "/export/csv").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
