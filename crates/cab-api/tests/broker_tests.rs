//! # Integration Tests for cab-api
//!
//! Drives the full router against a temporary store: submission and
//! polling, the track index, artifact delivery with ETag revalidation, and
//! refusal of tampered artifacts.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use cab_api::state::{AppState, BrokerConfig};
use cab_core::{Fingerprint, JobSnapshot, JobStatus};
use cab_queue::{RunOutput, RunRequest, Runner, RunnerError};
use cab_store::{FsArtifactStore, Manifest, StoreLayout};

const WAIT: Duration = Duration::from_secs(10);
const SOURCE_HASH: &str = "src123";

/// Runner that stores `{"track_id", "run_id"}` under `<config_hash>/src123`.
fn storing_runner(layout: StoreLayout) -> Arc<dyn Runner> {
    let store = FsArtifactStore::new(layout);
    Arc::new(move |req: &RunRequest| -> Result<RunOutput, RunnerError> {
        let fp = Fingerprint::parse(req.inputs.config_hash.as_str(), SOURCE_HASH)
            .map_err(|e| RunnerError::Failed(e.to_string()))?;
        let body = serde_json::json!({
            "track_id": req.inputs.track_id,
            "run_id": req.inputs.run_id,
        });
        let stored = store
            .write_artifact(&fp, body.to_string().as_bytes())
            .map_err(|e| RunnerError::Failed(e.to_string()))?;
        Ok(RunOutput {
            artifact: stored.artifact_path,
            manifest: stored.manifest_path,
        })
    })
}

/// Helper: broker state rooted in `root`.
fn test_state(root: &Path) -> AppState {
    state_with(root, storing_runner)
}

fn state_with(root: &Path, runner: impl FnOnce(StoreLayout) -> Arc<dyn Runner>) -> AppState {
    let config = BrokerConfig {
        cas_root: root.join("cas"),
        workers: 2,
        ..BrokerConfig::default()
    };
    let runner = runner(config.layout());
    AppState::new(config, runner).unwrap()
}

/// Helper: an existing features file.
fn features_file(root: &Path) -> String {
    let path = root.join("features.json");
    std::fs::write(&path, b"{}").unwrap();
    path.to_string_lossy().into_owned()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn submit(app: &axum::Router, body: &Value) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/echo/jobs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    json["job_id"].as_str().unwrap().to_string()
}

async fn poll(app: &axum::Router, job_id: &str) -> JobSnapshot {
    let response = app
        .clone()
        .oneshot(get(&format!("/echo/jobs/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Helper: poll `GET /echo/jobs/{id}` until the job is done or failed.
async fn poll_until_finished(app: &axum::Router, job_id: &str) -> JobSnapshot {
    let deadline = Instant::now() + WAIT;
    loop {
        let job = poll(app, job_id).await;
        if job.status.is_terminal() {
            return job;
        }
        assert!(Instant::now() < deadline, "job {job_id} still {}", job.status);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Helper: submit a job and poll it to completion.
async fn run_job(app: &axum::Router, body: Value) -> JobSnapshot {
    let job_id = submit(app, &body).await;
    poll_until_finished(app, &job_id).await
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_health_probes() {
    let tmp = tempfile::tempdir().unwrap();
    let app = cab_api::app(test_state(tmp.path()));

    let response = app.clone().oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");

    let response = app.oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ready");
}

// -- Submission ---------------------------------------------------------------

#[tokio::test]
async fn test_submit_malformed_json_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = cab_api::app(test_state(tmp.path()));
    let response = app
        .oneshot(post_json("/echo/jobs", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_submit_missing_features_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let body = serde_json::json!({
        "features_path": tmp.path().join("absent.json"),
        "track_id": "t1",
    });
    let response = app
        .clone()
        .oneshot(post_json("/echo/jobs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/echo/jobs", r#"{"track_id": "t1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.queue.stats().jobs.total(), 0);
}

#[tokio::test]
async fn test_submit_unsafe_identifiers_are_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = cab_api::app(test_state(tmp.path()));
    let features = features_file(tmp.path());

    let body = serde_json::json!({ "features_path": features, "track_id": "../escape" });
    let response = app
        .clone()
        .oneshot(post_json("/echo/jobs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({
        "features_path": features,
        "track_id": "ok",
        "config_hash": "index",
    });
    let response = app
        .oneshot(post_json("/echo/jobs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_returns_accepted_pending() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let body = serde_json::json!({
        "features_path": features_file(tmp.path()),
        "track_id": "t1",
    });
    let response = app
        .oneshot(post_json("/echo/jobs", &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    assert!(json["job_id"].as_str().is_some());
    assert!(state.queue.drain_timeout(WAIT));
}

// -- Polling ------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_or_invalid_job_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let app = cab_api::app(test_state(tmp.path()));

    let response = app
        .clone()
        .oneshot(get("/echo/jobs/6f1c7f38-3f7e-4c51-9d7a-1c2b7d8e9f00"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/echo/jobs/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_job_uses_default_config_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let job = run_job(
        &app,
        serde_json::json!({ "features_path": features_file(tmp.path()), "track_id": "t1" }),
    )
    .await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    assert_eq!(job.config_hash.as_str(), "default");
    assert!(job.finished_at.is_some());
}

// -- End to End ---------------------------------------------------------------

#[tokio::test]
async fn test_end_to_end_delivery_and_revalidation() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let job = run_job(
        &app,
        serde_json::json!({
            "features_path": features_file(tmp.path()),
            "track_id": "track-1",
            "run_id": "run-7",
            "config_hash": "cfg",
            "probe": {"window": 4},
        }),
    )
    .await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    let etag = job.result.unwrap().etag.to_hex();

    // Index
    let response = app
        .clone()
        .oneshot(get("/echo/index/track-1.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
    let entry = body_json(response).await;
    assert_eq!(entry["etag"], etag.as_str());
    assert_eq!(entry["source_hash"], SOURCE_HASH);
    let artifact_url = entry["artifact"].as_str().unwrap().to_string();
    let manifest_url = entry["manifest"].as_str().unwrap().to_string();
    assert_eq!(artifact_url, "/echo/cfg/src123/historical_echo.json");

    // Artifact
    let response = app.clone().oneshot(get(&artifact_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let artifact = body_json(response).await;
    assert_eq!(artifact["track_id"], "track-1");
    assert_eq!(artifact["run_id"], "run-7");

    // Revalidation
    let request = Request::builder()
        .uri(&artifact_url)
        .header(header::IF_NONE_MATCH, format!("\"{etag}\""))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
    assert!(body_bytes(response).await.is_empty());

    let request = Request::builder()
        .uri(&artifact_url)
        .header(header::IF_NONE_MATCH, "\"stale\"")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Manifest
    let response = app.clone().oneshot(get(&manifest_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ETAG).is_none());
    let manifest = Manifest::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(manifest.artifact.sha256, etag);

    // Anything else in the fingerprint directory
    let response = app
        .oneshot(get("/echo/cfg/src123/other.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_percent_encoded_track_id() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let job = run_job(
        &app,
        serde_json::json!({
            "features_path": features_file(tmp.path()),
            "track_id": "Track One",
        }),
    )
    .await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);

    let response = app
        .oneshot(get("/echo/index/Track%20One.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["track_id"], "Track One");
}

#[tokio::test]
async fn test_tampered_artifact_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let job = run_job(
        &app,
        serde_json::json!({
            "features_path": features_file(tmp.path()),
            "track_id": "t1",
            "config_hash": "cfg",
        }),
    )
    .await;
    let artifact_path = job.result.unwrap().artifact_path;
    std::fs::write(&artifact_path, br#"{"tampered": true}"#).unwrap();

    let response = app
        .oneshot(get("/echo/cfg/src123/historical_echo.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INTEGRITY_ERROR");
}

#[tokio::test]
async fn test_artifact_without_manifest_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());

    let dir = state.layout().echo_root().join("cfg/orphan");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("historical_echo.json"), b"{}").unwrap();

    let response = app
        .oneshot(get("/echo/cfg/orphan/historical_echo.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_index_and_artifact_are_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let app = cab_api::app(test_state(tmp.path()));

    for uri in [
        "/echo/index/nobody.json",
        "/echo/index/nobody",
        "/echo/cfg/src/historical_echo.json",
        "/echo/cfg/src/manifest.json",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_submit_does_not_wait_for_runner() {
    let tmp = tempfile::tempdir().unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let state = state_with(tmp.path(), |layout| {
        let inner = storing_runner(layout);
        Arc::new(move |req: &RunRequest| -> Result<RunOutput, RunnerError> {
            let _ = release_rx.lock().recv();
            inner.run(req)
        })
    });
    let app = cab_api::app(state);

    let started = Instant::now();
    let job_id = submit(
        &app,
        &serde_json::json!({
            "features_path": features_file(tmp.path()),
            "track_id": "slow",
        }),
    )
    .await;
    assert!(started.elapsed() < Duration::from_secs(1));

    // The runner is still blocked.
    let status = poll(&app, &job_id).await.status;
    assert!(matches!(status, JobStatus::Pending | JobStatus::Running));

    release_tx.send(()).unwrap();
    let job = poll_until_finished(&app, &job_id).await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);

    let response = app.oneshot(get("/echo/index/slow.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_track_id_length_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = cab_api::app(state.clone());
    let features = features_file(tmp.path());

    for len in [251, 255] {
        let body = serde_json::json!({ "features_path": features, "track_id": "t".repeat(len) });
        let response = app
            .clone()
            .oneshot(post_json("/echo/jobs", &body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "len {len}");

        let uri = format!("/echo/index/{}.json", "t".repeat(len));
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "len {len}");
    }
    assert_eq!(state.queue.stats().jobs.total(), 0);

    let longest = "t".repeat(250);
    let job = run_job(
        &app,
        serde_json::json!({ "features_path": features, "track_id": longest }),
    )
    .await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    let response = app
        .oneshot(get(&format!("/echo/index/{longest}.json")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
