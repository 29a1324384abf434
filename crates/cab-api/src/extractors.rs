//! # Request Extraction
//!
//! Request DTOs carry raw strings. [`Validate`] turns one into the domain
//! value a handler works with, resolving broker defaults on the way, so
//! identifiers are parsed exactly once. Deserialization failures, missing
//! fields and rejected identifiers are all a 400.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// A request body that converts into a validated domain value.
pub trait Validate {
    type Output;

    /// Check the body's rules and build the domain value. Identifier errors
    /// become [`AppError::BadRequest`] through `?`.
    fn validate(self, state: &AppState) -> Result<Self::Output, AppError>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and convert it with [`Validate`].
///
/// ```ignore
/// async fn handler(
///     State(state): State<AppState>,
///     body: Result<Json<SubmitJobRequest>, JsonRejection>,
/// ) -> Result<..., AppError> {
///     let inputs: JobInputs = extract_validated_json(body, &state)?;
/// }
/// ```
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
    state: &AppState,
) -> Result<T::Output, AppError> {
    extract_json(result)?.validate(state)
}
