//! Error responses for the JSON endpoints.
//!
//! Every error body is `{"error": "<message>"}`. Storage and hashing failures
//! are logged with their cause; the client only sees the context.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Map a failed `Result` to a 500, logging the cause.
pub trait ResultExt<T> {
    /// Database or token store failure; reported as "Database error".
    fn db_err(self, context: &'static str) -> Result<T, ApiError>;
    /// Any other server-side failure; reported with `context` as the message.
    fn internal_err(self, context: &'static str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, context: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!(error = %e, "{}", context);
            ApiError::Internal("Database error")
        })
    }

    fn internal_err(self, context: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!(error = %e, "{}", context);
            ApiError::Internal(context)
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed input or a password that breaks the rules.
    BadRequest(String),
    /// Wrong credentials at login.
    Unauthorized(String),
    NotFound(String),
    Internal(&'static str),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => {
                msg.as_str()
            }
            ApiError::Internal(context) => *context,
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_db_err_hides_cause() {
        let result: Result<(), _> = Err("disk I/O error at page 7");
        let response = result.db_err("Failed to list users").unwrap_err().into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await["error"], "Database error");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = ApiError::not_found("User not found").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await["error"], "User not found");
    }
}
