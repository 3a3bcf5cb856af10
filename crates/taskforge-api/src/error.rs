//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use taskforge_core::pipeline::ApiErrorResponse;

/// Maps a [`taskforge_core::Error`] onto the status codes listed in
/// the base spec's §6 "Management surface": 400 invalid input, 404
/// unknown pipeline, 409 conflict, 500 persistence failure.
#[derive(Debug)]
pub struct ApiError(taskforge_core::Error);

impl From<taskforge_core::Error> for ApiError {
    fn from(err: taskforge_core::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use taskforge_core::Error::*;
        let (status, message) = match self.0 {
            InputInvalid(msg) => (StatusCode::BAD_REQUEST, msg),
            NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Conflict(msg) => (StatusCode::CONFLICT, msg),
            Persistence(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ExecutionFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Corruption(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ApiErrorResponse { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::from(taskforge_core::Error::NotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let response = ApiError::from(taskforge_core::Error::Conflict("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn input_invalid_maps_to_400() {
        let response =
            ApiError::from(taskforge_core::Error::InputInvalid("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_maps_to_500() {
        let response =
            ApiError::from(taskforge_core::Error::Persistence("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
