//! Integration tests for a full archive run over an in-memory catalog
//!
//! Tests verify:
//! - one local copy per video across folders and the final sweep
//! - directory layout mirrors the folder tree
//! - sidecars carry the payload the file was chosen from
//! - existing files are kept unless overwrite is requested
//! - an interrupted transfer is resumed, not skipped, on the next run
//! - videos whose names collide get distinct files
//! - per-video failures do not stop the run, listing failures do

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use vimeo_archiver::api::{ApiConfig, ApiError, ApiResult, CatalogSource, ItemStream, RawFolder};
use vimeo_archiver::downloader::{
    partial_path, DownloadEngine, DownloadError, FileTransfer, TransferConfig, TransferOutcome,
};
use vimeo_archiver::orchestrator::{Orchestrator, OrchestratorError, OrchestratorOptions};
use vimeo_archiver::retry::RetryPolicy;

use crate::support::{sample_bytes, FixtureServer, Reply};

#[derive(Default)]
struct FakeCatalog {
    folders: Vec<Value>,
    folder_assets: HashMap<String, Vec<Value>>,
    all_assets: Vec<Value>,
    details: HashMap<String, Value>,
    failing_folder: Option<String>,
    detail_calls: Mutex<Vec<String>>,
    sweep_calls: Mutex<usize>,
}

impl FakeCatalog {
    fn with_folder(mut self, folder: Value, assets: Vec<Value>) -> Self {
        if let Some(uri) = folder["uri"].as_str() {
            self.folder_assets
                .entry(uri.to_string())
                .or_default()
                .extend(assets);
        }
        self.folders.push(folder);
        self
    }

    fn with_all_assets(mut self, assets: Vec<Value>) -> Self {
        self.all_assets = assets;
        self
    }

    fn with_detail(mut self, uri: &str, detail: Value) -> Self {
        self.details.insert(uri.to_string(), detail);
        self
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn folders(&self) -> ApiResult<Vec<RawFolder>> {
        Ok(self.folders.iter().cloned().map(RawFolder::from_value).collect())
    }

    fn folder_assets(&self, folder_uri: &str) -> ItemStream<'_> {
        if self.failing_folder.as_deref() == Some(folder_uri) {
            return Box::pin(stream::iter(vec![Err::<Value, _>(ApiError::Unauthorized {
                url: folder_uri.to_string(),
            })]));
        }
        let items = self.folder_assets.get(folder_uri).cloned().unwrap_or_default();
        Box::pin(stream::iter(items.into_iter().map(Ok::<_, ApiError>)))
    }

    fn all_assets(&self) -> ItemStream<'_> {
        *self.sweep_calls.lock().unwrap() += 1;
        Box::pin(stream::iter(
            self.all_assets.clone().into_iter().map(Ok::<_, ApiError>),
        ))
    }

    async fn asset_detail(&self, asset_uri: &str) -> ApiResult<Value> {
        self.detail_calls.lock().unwrap().push(asset_uri.to_string());
        self.details
            .get(asset_uri)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                url: asset_uri.to_string(),
                body: String::new(),
            })
    }
}

/// Writes the link text as the file body.
#[derive(Default)]
struct FakeTransfer {
    calls: Mutex<Vec<(String, PathBuf)>>,
    failing_links: Vec<String>,
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn fetch(&self, link: &str, dest: &Path) -> Result<TransferOutcome, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push((link.to_string(), dest.to_path_buf()));
        if self.failing_links.iter().any(|l| l == link) {
            return Err(DownloadError::AttemptsExhausted {
                attempts: 5,
                last_error: "connection reset".to_string(),
            });
        }
        std::fs::write(dest, link.as_bytes())?;
        let len = link.len() as u64;
        Ok(TransferOutcome {
            path: dest.to_path_buf(),
            bytes_written: len,
            total_size: len,
            attempts: 1,
            resumed: false,
        })
    }
}

fn folder(id: u32, name: &str, parent: Option<u32>) -> Value {
    let mut value = json!({"uri": format!("/users/1/projects/{id}"), "name": name});
    if let Some(parent) = parent {
        value["metadata"] = json!({
            "connections": {"parent_folder": {"uri": format!("/users/1/projects/{parent}")}}
        });
    }
    value
}

fn video(id: u32, name: &str) -> Value {
    json!({
        "uri": format!("/videos/{id}"),
        "name": name,
        "files": [
            {"type": "video/mp4", "height": 720, "link": format!("https://cdn.test/{id}/720.mp4")},
            {"type": "video/mp4", "height": 1080, "link": format!("https://cdn.test/{id}/1080.mp4")}
        ]
    })
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn sample_catalog() -> FakeCatalog {
    FakeCatalog::default()
        .with_folder(folder(1, "Alpha", None), vec![video(1, "Clip One")])
        .with_folder(
            folder(2, "Beta", Some(1)),
            vec![video(1, "Clip One"), video(2, "Clip Two")],
        )
        .with_all_assets(vec![
            video(1, "Clip One"),
            video(2, "Clip Two"),
            video(3, "Loose"),
        ])
}

#[tokio::test]
async fn test_each_video_downloaded_once() {
    let out = TempDir::new().unwrap();
    let catalog = sample_catalog();
    let transfer = FakeTransfer::default();

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.folders_visited, 2);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.skipped_duplicate, 3);
    assert_eq!(summary.failed, 0);

    let calls = transfer.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (
                "https://cdn.test/1/1080.mp4".to_string(),
                out.path().join("Alpha").join("Clip One.mp4")
            ),
            (
                "https://cdn.test/2/1080.mp4".to_string(),
                out.path().join("Alpha").join("Beta").join("Clip Two.mp4")
            ),
            (
                "https://cdn.test/3/1080.mp4".to_string(),
                out.path().join("Loose.mp4")
            ),
        ]
    );

    let sidecar = read_json(&out.path().join("Alpha").join("Clip One.mp4.json"));
    assert_eq!(sidecar, video(1, "Clip One"));
    assert!(out.path().join("Loose.mp4.json").exists());
    assert!(!out.path().join("Alpha").join("Beta").join("Clip One.mp4").exists());
}

#[tokio::test]
async fn test_folders_only_skips_sweep() {
    let out = TempDir::new().unwrap();
    let catalog = sample_catalog();
    let transfer = FakeTransfer::default();

    let options = OrchestratorOptions::new(out.path()).with_folders_only(true);
    let summary = Orchestrator::new(&catalog, &transfer, options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(*catalog.sweep_calls.lock().unwrap(), 0);
    assert!(!out.path().join("Loose.mp4").exists());
}

#[tokio::test]
async fn test_existing_file_kept_and_sidecar_refreshed() {
    let out = TempDir::new().unwrap();
    std::fs::write(out.path().join("Loose.mp4"), b"previous run").unwrap();

    let catalog = FakeCatalog::default().with_all_assets(vec![video(3, "Loose")]);
    let transfer = FakeTransfer::default();

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.downloaded, 0);
    assert!(transfer.calls.lock().unwrap().is_empty());
    assert_eq!(
        std::fs::read(out.path().join("Loose.mp4")).unwrap(),
        b"previous run"
    );
    assert_eq!(read_json(&out.path().join("Loose.mp4.json")), video(3, "Loose"));
}

#[tokio::test]
async fn test_overwrite_replaces_existing_file() {
    let out = TempDir::new().unwrap();
    std::fs::write(out.path().join("Loose.mp4"), b"previous run, much longer than the link").unwrap();

    let catalog = FakeCatalog::default().with_all_assets(vec![video(3, "Loose")]);
    let transfer = FakeTransfer::default();

    let options = OrchestratorOptions::new(out.path()).with_overwrite(true);
    let summary = Orchestrator::new(&catalog, &transfer, options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(
        std::fs::read_to_string(out.path().join("Loose.mp4")).unwrap(),
        "https://cdn.test/3/1080.mp4"
    );
}

#[tokio::test]
async fn test_detail_fetch_when_listing_has_no_link() {
    let out = TempDir::new().unwrap();
    let detail = json!({
        "uri": "/videos/7",
        "name": "Master",
        "download": [
            {"type": "source", "height": 1080, "link": "https://cdn.test/7/source.mov"},
            {"height": 720, "link": "https://cdn.test/7/720.mp4"}
        ]
    });
    let catalog = FakeCatalog::default()
        .with_all_assets(vec![
            json!({"uri": "/videos/7", "name": "Master"}),
            json!({"uri": "/videos/8", "name": "Processing"}),
        ])
        .with_detail("/videos/7", detail.clone())
        .with_detail("/videos/8", json!({"uri": "/videos/8", "files": []}));
    let transfer = FakeTransfer::default();

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.skipped_no_rendition, 1);
    assert_eq!(
        catalog.detail_calls.lock().unwrap().clone(),
        vec!["/videos/7".to_string(), "/videos/8".to_string()]
    );
    assert_eq!(read_json(&out.path().join("Master.mov.json")), detail);
    assert!(!out.path().join("Processing.mp4").exists());
    assert!(!out.path().join("Processing.mp4.json").exists());
}

#[tokio::test]
async fn test_failed_transfer_does_not_stop_run() {
    let out = TempDir::new().unwrap();
    let catalog = FakeCatalog::default().with_all_assets(vec![video(4, "Broken"), video(5, "Fine")]);
    let transfer = FakeTransfer {
        failing_links: vec!["https://cdn.test/4/1080.mp4".to_string()],
        ..FakeTransfer::default()
    };

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 1);
    assert!(!out.path().join("Broken.mp4.json").exists());
    assert!(out.path().join("Fine.mp4").exists());
}

#[tokio::test]
async fn test_unsafe_and_missing_names_sanitized() {
    let out = TempDir::new().unwrap();
    let mut unnamed = video(9, "");
    unnamed["name"] = Value::Null;
    let catalog = FakeCatalog::default()
        .with_folder(folder(5, "a/b: c", None), vec![video(6, "x?y")])
        .with_folder(folder(6, "", None), vec![unnamed]);
    let transfer = FakeTransfer::default();

    let options = OrchestratorOptions::new(out.path()).with_folders_only(true);
    Orchestrator::new(&catalog, &transfer, options)
        .run()
        .await
        .unwrap();

    assert!(out.path().join("a_b_ c").join("x_y.mp4").exists());
    assert!(out.path().join("folder_6").join("video_9.mp4").exists());
}

#[tokio::test]
async fn test_cyclic_and_duplicate_folders_terminate() {
    let out = TempDir::new().unwrap();
    let catalog = FakeCatalog::default()
        .with_folder(folder(1, "Top", None), vec![video(1, "One")])
        .with_folder(folder(1, "Top again", Some(2)), vec![])
        .with_folder(folder(2, "Child", Some(1)), vec![video(2, "Two")])
        .with_folder(folder(3, "Orphan A", Some(4)), vec![video(3, "Three")])
        .with_folder(folder(4, "Orphan B", Some(3)), vec![])
        .with_all_assets(vec![video(3, "Three")]);
    let transfer = FakeTransfer::default();

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.folders_visited, 2);
    assert_eq!(summary.downloaded, 3);
    assert!(out.path().join("Top").join("Child").join("Two.mp4").exists());
    assert!(out.path().join("Three.mp4").exists());
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let out = TempDir::new().unwrap();
    let catalog = FakeCatalog {
        failing_folder: Some("/users/1/projects/1".to_string()),
        ..sample_catalog()
    };
    let transfer = FakeTransfer::default();

    let result = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Api(ApiError::Unauthorized { .. }))
    ));
    assert_eq!(*catalog.sweep_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_overwrite_discards_leftover_part_file() {
    let out = TempDir::new().unwrap();
    let dest = out.path().join("Loose.mp4");
    std::fs::write(partial_path(&dest), b"bytes of an older upload").unwrap();

    let catalog = FakeCatalog::default().with_all_assets(vec![video(3, "Loose")]);
    let transfer = FakeTransfer::default();

    let options = OrchestratorOptions::new(out.path()).with_overwrite(true);
    let summary = Orchestrator::new(&catalog, &transfer, options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert!(!partial_path(&dest).exists());
}

#[tokio::test]
async fn test_interrupted_transfer_resumed_by_next_run() {
    let server = FixtureServer::start().await;
    let content = sample_bytes(100);
    server.push(Reply::new(200, content[..40].to_vec()).truncated(100));

    let payload = json!({
        "uri": "/videos/21",
        "name": "Keynote",
        "files": [{"type": "video/mp4", "height": 1080, "link": server.url("/v/21.mp4")}]
    });
    let catalog = FakeCatalog::default().with_all_assets(vec![payload.clone()]);
    let engine = DownloadEngine::new(
        &ApiConfig::new("secret"),
        TransferConfig::default().with_retry_policy(RetryPolicy::immediate(1)),
    )
    .unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("Keynote.mp4");

    let first = Orchestrator::new(&catalog, &engine, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();
    assert_eq!(first.failed, 1);
    assert!(!dest.exists());
    assert!(!out.path().join("Keynote.mp4.json").exists());
    assert_eq!(std::fs::metadata(partial_path(&dest)).unwrap().len(), 40);

    server.push(Reply::new(206, content[40..].to_vec()));
    let second = Orchestrator::new(&catalog, &engine, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(second.downloaded, 1);
    assert_eq!(second.skipped_existing, 0);
    assert_eq!(second.bytes_transferred, 60);
    assert_eq!(server.requests()[1].header("range"), Some("bytes=40-"));
    assert_eq!(std::fs::read(&dest).unwrap(), content);
    assert!(!partial_path(&dest).exists());
    assert_eq!(read_json(&out.path().join("Keynote.mp4.json")), payload);
}

#[tokio::test]
async fn test_colliding_names_get_distinct_files() {
    let out = TempDir::new().unwrap();
    let catalog = FakeCatalog::default()
        .with_all_assets(vec![video(11, "Team: Sync"), video(12, "Team/ Sync")]);
    let transfer = FakeTransfer::default();

    let summary = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    let first = out.path().join("Team_ Sync.mp4");
    let second = out.path().join("Team_ Sync_12.mp4");
    assert_eq!(
        std::fs::read_to_string(&first).unwrap(),
        "https://cdn.test/11/1080.mp4"
    );
    assert_eq!(
        std::fs::read_to_string(&second).unwrap(),
        "https://cdn.test/12/1080.mp4"
    );
    assert_eq!(
        read_json(&out.path().join("Team_ Sync.mp4.json")),
        video(11, "Team: Sync")
    );
    assert_eq!(
        read_json(&out.path().join("Team_ Sync_12.mp4.json")),
        video(12, "Team/ Sync")
    );

    // A second run maps each video to the same file again.
    let rerun = Orchestrator::new(&catalog, &transfer, OrchestratorOptions::new(out.path()))
        .run()
        .await
        .unwrap();
    assert_eq!(rerun.skipped_existing, 2);
    assert_eq!(
        read_json(&out.path().join("Team_ Sync.mp4.json")),
        video(11, "Team: Sync")
    );
}
