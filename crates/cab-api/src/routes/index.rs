//! # Track Index Lookup
//!
//! `GET /echo/index/{track_id}.json` returns the track's pointer record.
//! The record moves whenever a newer job for the track completes, so it is
//! only cacheable for a short time. Anything that does not name an existing
//! record, including names no valid track id could produce, is a `404`.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use cab_core::TrackId;

use crate::error::AppError;
use crate::state::AppState;

/// `Cache-Control` for index records.
pub const INDEX_CACHE_CONTROL: &str = "max-age=60";

/// Build the index router.
pub fn router() -> Router<AppState> {
    Router::new().route("/echo/index/{file}", get(get_index))
}

/// GET /echo/index/{track_id}.json — Latest validated artifact for a track.
async fn get_index(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(format!("index record {file:?} not found"));
    // A name no track id can produce has no record either.
    let track_id = file
        .strip_suffix(".json")
        .and_then(|stem| TrackId::new(stem).ok())
        .ok_or_else(not_found)?;

    let index = state.index.clone();
    let entry = tokio::task::spawn_blocking(move || index.read(&track_id)).await??;

    match entry {
        Some(entry) => Ok((
            [(header::CACHE_CONTROL, INDEX_CACHE_CONTROL)],
            Json(entry),
        )),
        None => Err(not_found()),
    }
}
