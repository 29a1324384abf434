//! # Job Submission & Polling
//!
//! - `POST /echo/jobs` enqueues a job and answers `202` immediately.
//! - `GET /echo/jobs/{job_id}` returns the job's current snapshot.
//!
//! Input problems are rejected here with `400` and never reach the queue.
//! The `features_path` existence check touches the filesystem, so it runs
//! on the blocking pool.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use cab_core::{ConfigHash, JobId, JobInputs, JobSnapshot, JobStatus, TrackId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Body of `POST /echo/jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub features_path: Option<String>,
    pub track_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub config_hash: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub db_hash: Option<String>,
    #[serde(default, alias = "probe")]
    pub probe_kwargs: Option<Map<String, Value>>,
    #[serde(default)]
    pub runner_kwargs: Option<Map<String, Value>>,
}

impl Validate for SubmitJobRequest {
    type Output = JobInputs;

    fn validate(self, state: &AppState) -> Result<JobInputs, AppError> {
        let features_path = match self.features_path {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => return Err(AppError::BadRequest("features_path is required".into())),
        };
        let track_id = self
            .track_id
            .ok_or_else(|| AppError::BadRequest("track_id is required".into()))?;
        let config_hash = self
            .config_hash
            .unwrap_or_else(|| state.config.default_config_hash.clone());

        let mut inputs = JobInputs::new(
            features_path,
            state.layout().out_root(),
            TrackId::new(track_id)?,
            ConfigHash::new(config_hash)?,
        );
        inputs.run_id = self.run_id;
        inputs.db_path = self.db_path;
        inputs.db_hash = self.db_hash;
        inputs.probe_kwargs = self.probe_kwargs.unwrap_or_default();
        inputs.runner_kwargs = self.runner_kwargs.unwrap_or_default();
        Ok(inputs)
    }
}

/// Body of the `202` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Build the jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/echo/jobs", post(submit_job))
        .route("/echo/jobs/{job_id}", get(get_job))
}

/// POST /echo/jobs — Enqueue a job.
async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), AppError> {
    let inputs = extract_validated_json(body, &state)?;

    let features_path = inputs.features_path.clone();
    if !tokio::task::spawn_blocking(move || features_path.is_file()).await? {
        return Err(AppError::BadRequest(format!(
            "features_path {:?} is not an existing file",
            inputs.features_path
        )));
    }

    let job_id = state.queue.submit(inputs)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobStatus::Pending,
        }),
    ))
}

/// GET /echo/jobs/{job_id} — Poll a job.
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, AppError> {
    let not_found = || AppError::NotFound(format!("job {job_id} not found"));
    let id = JobId::parse(&job_id).map_err(|_| not_found())?;
    state.queue.get(&id).map(Json).ok_or_else(not_found)
}
