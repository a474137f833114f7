//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::cookie::{append_cookies, cleared_session_cookies};

/// Why a request was refused. Expired, invalid, tampered and unrecorded
/// tokens all collapse into `SessionExpired`; only the logs tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotLoggedIn,
    SessionExpired,
    InsufficientRole,
}

impl AuthErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            AuthErrorKind::NotLoggedIn | AuthErrorKind::SessionExpired => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AuthErrorKind::NotLoggedIn => "Not logged in",
            AuthErrorKind::SessionExpired => "Session expired, please log in again",
            AuthErrorKind::InsufficientRole => "Admin privileges required",
        }
    }
}

/// API authentication error. Returns JSON, and clears both session cookies
/// when built with `clearing_cookies`.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
    /// `Some(secure)` when the response should clear the session cookies.
    clear_cookies: Option<bool>,
}

impl ApiAuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self {
            kind,
            clear_cookies: None,
        }
    }

    pub fn clearing_cookies(mut self, secure: bool) -> Self {
        self.clear_cookies = Some(secure);
        self
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            self.kind.status_code(),
            Json(ErrorResponse {
                error: self.kind.message(),
            }),
        )
            .into_response();

        if let Some(secure) = self.clear_cookies {
            append_cookies(response.headers_mut(), cleared_session_cookies(secure));
        }

        response
    }
}
