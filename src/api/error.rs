/// HTTP error mapping
///
/// Every handler error ends up as a JSON body `{"error": "..."}`. Internal
/// failures are logged and answered with a generic message.

use crate::auth::AuthError;
use crate::workflow::WorkflowError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or missing required fields
    BadRequest(String),
    /// Missing or malformed Authorization header
    Unauthorized,
    Auth(AuthError),
    Workflow(WorkflowError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError::Workflow(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid JSON body: {}", e.body_text()))
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid Authorization header".to_string(),
            ),
            ApiError::Auth(e @ (AuthError::InvalidCredentials | AuthError::InvalidToken)) => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            ApiError::Auth(e @ AuthError::EmailExists) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Workflow(
                e @ (WorkflowError::NotFound
                | WorkflowError::TriggerNotFound
                | WorkflowError::ActionNotFound
                | WorkflowError::RunNotFound),
            ) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Auth(_) | ApiError::Workflow(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                ApiError::Auth(e) => tracing::error!("❌ Auth failure: {}", e),
                ApiError::Workflow(e) => tracing::error!("❌ Workflow failure: {}", e),
                _ => {}
            }
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn status_codes() {
        assert_eq!(status(ApiError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::InvalidCredentials.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::InvalidToken.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::EmailExists.into()), StatusCode::CONFLICT);
        assert_eq!(status(WorkflowError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(WorkflowError::TriggerNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(WorkflowError::ActionNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(WorkflowError::RunNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(WorkflowError::Store(StoreError::Timeout).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthError::Store(StoreError::Corrupt("bad".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::from(WorkflowError::Store(StoreError::Corrupt("secret detail".into())));
        let (_, message) = err.status_and_message();
        assert_eq!(message, "internal error");
    }
}
