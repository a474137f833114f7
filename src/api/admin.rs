//! Admin API endpoints.
//!
//! All endpoints require a session whose identity carries the admin flag.

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, require_session};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::store::TokenStore;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub tokens: Arc<dyn TokenStore>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/revoke-sessions", post(revoke_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<AdminState>,
        ))
        .with_state(state)
}

/// List all users.
async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Serialize)]
struct RevokeSessionsResponse {
    revoked: u64,
}

/// Revoke every session of one user. Other users are unaffected.
async fn revoke_sessions(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let revoked = state
        .tokens
        .revoke_all_for_user(&id)
        .await
        .db_err("Failed to revoke sessions")?;

    info!(admin_id = %auth.identity.id, user_id = %id, revoked, "Admin revoked sessions");
    Ok(Json(RevokeSessionsResponse { revoked }))
}
