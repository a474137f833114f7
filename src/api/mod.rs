mod admin;
mod auth;
mod error;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::store::TokenStore;

pub use admin::AdminState;
pub use auth::AuthState;
pub use error::{ApiError, ResultExt};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    tokens: Arc<dyn TokenStore>,
    secure_cookies: bool,
    rate_limit: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        tokens: tokens.clone(),
        secure_cookies,
    };

    let admin_state = AdminState {
        db,
        jwt,
        tokens,
        secure_cookies,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limit))
        .nest("/admin", admin::router(admin_state))
}
