//! API handlers

pub mod auth;
pub mod health;
pub mod playlists;
pub mod users;

use axum::{extract::rejection::JsonRejection, Json};

use crate::error::AppError;

/// Unwrap a JSON body, reporting malformed input as a validation failure
///
/// Handlers take `Result<Json<T>, JsonRejection>` so that syntax errors,
/// wrong types, unknown fields and a missing content type all answer 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            Err(AppError::Validation(vec![rejection.body_text()]))
        }
    }
}
