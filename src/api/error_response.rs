//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let api_error: ApiError = self.into();

        (
            status_code,
            [(header::CACHE_CONTROL, "no-store")],
            Json(api_error),
        )
            .into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors normally go through Error::into_response, which knows the status
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatabaseError, Pipeline};
    use crate::types::ButtonId;

    async fn body(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_authentication_error_into_response() {
        let response = Error::Authentication("bad token".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );

        let api_error = body(response).await;
        assert_eq!(api_error.error.code, "authentication_failed");
        assert!(api_error.error.details.is_none());
    }

    #[tokio::test]
    async fn test_unknown_entity_into_response() {
        let error = Error::UnknownEntity {
            id: ButtonId(12),
            cls: "ZipBtn".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body(response).await;
        assert_eq!(api_error.error.code, "unknown_entity");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["id"], 12);
        assert_eq!(details["cls"], "ZipBtn");
    }

    #[tokio::test]
    async fn test_malformed_entry_into_response() {
        let error = Error::MalformedDownloadEntry {
            index: 2,
            value: serde_json::json!(7),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let api_error = body(response).await;
        assert_eq!(api_error.error.details.unwrap()["index"], 2);
    }

    #[tokio::test]
    async fn test_run_in_progress_into_response() {
        let response = Error::RunInProgress { id: ButtonId(3) }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(response).await.error.code, "run_in_progress");
    }

    #[tokio::test]
    async fn test_step_and_storage_errors_are_internal() {
        let step = Error::step_failed(Pipeline::FormHandling, 0, "select_files", "boom");
        let response = step.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await.error.code, "step_failed");

        let db = Error::Database(DatabaseError::QueryFailed("locked".to_string()));
        assert_eq!(
            db.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_api_error_into_response() {
        let response = ApiError::new("internal_error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
