//! # Artifact Delivery
//!
//! `GET /echo/{config_hash}/{source_hash}/{file_name}` serves the two files
//! of a fingerprint directory, nothing else.
//!
//! The artifact is re-hashed against its sibling manifest on every request
//! and refused with `500` if the two disagree. Its `ETag` is the bare sha256
//! hex; a matching `If-None-Match` gets `304` with no body. Both files are
//! immutable once written, so responses carry a one-year `immutable` cache
//! policy.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use cab_core::{sha256_bytes, Fingerprint};
use cab_store::{check_digest, ContentAddressedStore, Manifest, ValidationError};

use crate::error::AppError;
use crate::state::AppState;

/// `Cache-Control` for artifacts and manifests.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the artifact router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/echo/{config_hash}/{source_hash}/{file_name}",
        get(get_artifact),
    )
}

/// GET /echo/{config_hash}/{source_hash}/{file_name} — Artifact or manifest.
async fn get_artifact(
    State(state): State<AppState>,
    Path((config_hash, source_hash, file_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let not_found = || {
        AppError::NotFound(format!(
            "{config_hash}/{source_hash}/{file_name} not found"
        ))
    };
    let fingerprint = Fingerprint::parse(&config_hash, &source_hash).map_err(|_| not_found())?;
    let layout = state.layout().clone();

    if file_name == layout.manifest_name() {
        let store = state.store.clone();
        let name = file_name.clone();
        let fp = fingerprint.clone();
        let bytes = tokio::task::spawn_blocking(move || store.get(&fp, &name))
            .await??
            .ok_or_else(not_found)?;
        return Ok((
            [
                (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
                (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL),
            ],
            bytes,
        )
            .into_response());
    }

    if file_name != layout.artifact_name() {
        return Err(not_found());
    }

    let store = state.store.clone();
    let fp = fingerprint.clone();
    let (artifact, manifest) = tokio::task::spawn_blocking(move || {
        let layout = store.layout();
        let artifact = store.get(&fp, layout.artifact_name())?;
        let manifest = match artifact {
            Some(_) => store.get(&fp, layout.manifest_name())?,
            None => None,
        };
        Ok::<_, cab_store::StoreError>((artifact, manifest))
    })
    .await??;

    let artifact = artifact.ok_or_else(not_found)?;
    let manifest_path = layout.manifest_path(&fingerprint);
    let manifest_bytes =
        manifest.ok_or_else(|| ValidationError::ManifestMissing(manifest_path.clone()))?;
    let manifest =
        Manifest::from_slice(&manifest_bytes).map_err(|e| ValidationError::ManifestMalformed {
            path: manifest_path,
            reason: e.to_string(),
        })?;
    let etag = check_digest(&manifest, sha256_bytes(&artifact))?.to_hex();

    let revalidated = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag_matches(v, &etag));

    tracing::debug!(
        fingerprint = %fingerprint,
        etag = %etag,
        not_modified = revalidated,
        "serving artifact"
    );

    if revalidated {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, etag),
                (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
            ],
        )
            .into_response());
    }

    Ok((
        [
            (header::ETAG, etag),
            (header::CONTENT_TYPE, JSON_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
        ],
        artifact,
    )
        .into_response())
}

/// Whether an `If-None-Match` header value names `etag`.
///
/// Accepts `*`, quoted or bare tags, weak (`W/`) tags and comma-separated
/// lists. Tags compare case-insensitively since they are hex digests.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
        candidate.trim_matches('"').eq_ignore_ascii_case(etag)
    })
}
