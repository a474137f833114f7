//! Session API endpoints.
//!
//! - POST `/login` - Password login, issues both cookies (rate limited)
//! - POST `/refresh` - Rotate the refresh token and issue a new pair
//! - POST `/logout` - Revoke the current refresh token and clear cookies
//! - GET `/user` - Current user profile
//! - POST `/change-password` - Change password, ending every other session
//! - POST `/logout-all` - Revoke every session of the current user
//! - GET `/sessions` - List the current user's live sessions

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ApiAuthError, Auth, AuthErrorKind, IssuedSession, REFRESH_COOKIE_NAME, Rotation,
    append_cookies, cleared_session_cookies, get_cookie, issue_session, require_session, rotate,
};
use crate::db::{Database, User, UserSummary};
use crate::impl_has_auth_backend;
use crate::jwt::{Identity, JwtConfig, hash_token};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::store::TokenStore;
use crate::validation::validate_password;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub tokens: Arc<dyn TokenStore>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState, rate_limit: Arc<RateLimitConfig>) -> Router {
    let login_routes = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(rate_limit, rate_limit_login))
        .with_state(state.clone());

    let session_routes = Router::new()
        .route("/user", get(current_user))
        .route("/change-password", post(change_password))
        .route("/logout-all", post(logout_all))
        .route("/sessions", get(list_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<AuthState>,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(login_routes)
        .merge(session_routes)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    username: String,
    password: String,
    #[serde(default)]
    new_password: Option<String>,
}

#[derive(Serialize)]
struct SessionResponse<'a> {
    message: &'static str,
    user: &'a Identity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChangeRequired {
    message: &'static str,
    must_change_password: bool,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// JSON body plus both session cookies.
fn session_response(message: &'static str, session: &IssuedSession, secure: bool) -> Response {
    let mut response = Json(SessionResponse {
        message,
        user: &session.identity,
    })
    .into_response();
    append_cookies(response.headers_mut(), session.cookies(secure));
    response
}

async fn load_user(state: &AuthState, id: &str) -> Result<User, ApiError> {
    state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Password login.
///
/// A user flagged for a forced password change must send `newPassword`
/// alongside the current one; without it no session is issued.
async fn login(
    State(state): State<AuthState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .db
        .users()
        .get_by_username(&body.username)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let valid = verify_password(&body.password, &user.password_hash)
        .internal_err("Failed to verify password")?;
    if !valid {
        info!(username = %body.username, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let user = if user.must_change_password {
        let Some(new_password) = body.new_password.as_deref() else {
            return Ok(Json(PasswordChangeRequired {
                message: "Password change required",
                must_change_password: true,
            })
            .into_response());
        };

        validate_password(new_password).map_err(ApiError::bad_request)?;
        let new_hash = hash_password(new_password).internal_err("Failed to hash password")?;
        state
            .db
            .users()
            .update_password(&user.id, &new_hash)
            .await
            .db_err("Failed to update password")?;

        info!(user_id = %user.id, "Forced password change completed");
        User {
            password_hash: new_hash,
            must_change_password: false,
            ..user
        }
    } else {
        user
    };

    let session = issue_session(&state, &user)
        .await
        .internal_err("Failed to create session")?;

    info!(user_id = %user.id, "User logged in");
    Ok(session_response(
        "Login successful",
        &session,
        state.secure_cookies,
    ))
}

/// Rotate the refresh token. Any failure clears both cookies.
async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return ApiAuthError::new(AuthErrorKind::SessionExpired)
            .clearing_cookies(state.secure_cookies)
            .into_response();
    };

    match rotate(&state, refresh_token).await {
        Ok(Rotation::Rotated(session)) => {
            session_response("Token refreshed", &session, state.secure_cookies)
        }
        // A concurrent refresh won; its response carries the new cookies.
        Ok(Rotation::Superseded(identity)) => Json(SessionResponse {
            message: "Token already refreshed",
            user: &identity,
        })
        .into_response(),
        Err(kind) => ApiAuthError::new(kind)
            .clearing_cookies(state.secure_cookies)
            .into_response(),
    }
}

/// Revoke the presented refresh token, if any, and clear both cookies.
async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Err(e) = state.tokens.revoke(&hash_token(refresh_token)).await {
            warn!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    let mut response = Json(MessageResponse {
        message: "Logged out",
    })
    .into_response();
    append_cookies(
        response.headers_mut(),
        cleared_session_cookies(state.secure_cookies),
    );
    response
}

#[derive(Serialize)]
struct CurrentUserResponse {
    user: UserSummary,
}

async fn current_user(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let user = load_user(&state, &auth.identity.id).await?;
    Ok(Json(CurrentUserResponse { user: user.into() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

/// Change the password, revoke every session of the user and start a new one.
async fn change_password(
    State(state): State<AuthState>,
    auth: Auth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    validate_password(&body.new_password).map_err(ApiError::bad_request)?;

    let user = load_user(&state, &auth.identity.id).await?;
    let valid = verify_password(&body.old_password, &user.password_hash)
        .internal_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let new_hash = hash_password(&body.new_password).internal_err("Failed to hash password")?;
    state
        .db
        .users()
        .update_password(&user.id, &new_hash)
        .await
        .db_err("Failed to update password")?;

    let revoked = state
        .tokens
        .revoke_all_for_user(&user.id)
        .await
        .db_err("Failed to revoke sessions")?;

    let user = User {
        password_hash: new_hash,
        must_change_password: false,
        ..user
    };
    let session = issue_session(&state, &user)
        .await
        .internal_err("Failed to create session")?;

    info!(user_id = %user.id, revoked, "Password changed");
    Ok(session_response(
        "Password changed",
        &session,
        state.secure_cookies,
    ))
}

#[derive(Serialize)]
struct RevokedResponse {
    message: &'static str,
    revoked: u64,
}

/// Revoke every session of the current user, this one included.
async fn logout_all(State(state): State<AuthState>, auth: Auth) -> Result<Response, ApiError> {
    let revoked = state
        .tokens
        .revoke_all_for_user(&auth.identity.id)
        .await
        .db_err("Failed to revoke sessions")?;

    info!(user_id = %auth.identity.id, revoked, "Logged out everywhere");

    let mut response = Json(RevokedResponse {
        message: "Logged out from all sessions",
        revoked,
    })
    .into_response();
    append_cookies(
        response.headers_mut(),
        cleared_session_cookies(state.secure_cookies),
    );
    Ok(response)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    created_at: u64,
    expires_at: u64,
    current: bool,
}

#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<SessionInfo>,
}

/// List live sessions. The one tied to the caller's refresh cookie (or the
/// token rotated in during this request) is marked `current`.
async fn list_sessions(
    State(state): State<AuthState>,
    auth: Auth,
    headers: HeaderMap,
) -> Result<Json<SessionsResponse>, ApiError> {
    let current_hash = match &auth.rotated_refresh_hash {
        Some(hash) => Some(hash.clone()),
        None => get_cookie(&headers, REFRESH_COOKIE_NAME).map(hash_token),
    };

    let records = state
        .tokens
        .list_for_user(&auth.identity.id)
        .await
        .db_err("Failed to list sessions")?;

    let sessions = records
        .into_iter()
        .map(|record| SessionInfo {
            current: current_hash.as_deref() == Some(record.token_hash.as_str()),
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}
