//! Session issuance, rotation and the per-request session gate.
//!
//! A request carrying a valid access token proceeds untouched. A request
//! whose access token has expired (signature intact) is given a second
//! chance: if its refresh token verifies, is still recorded in the token
//! store, belongs to the same user and that user still exists, the session
//! is rotated and the new cookies ride along on the handler's response,
//! unless the handler set session cookies of its own. Everything else is
//! refused without telling the client why.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use super::cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SetCookie, append_cookies, get_cookie,
    sets_session_cookie,
};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::User;
use crate::jwt::{
    Identity, IssuedToken, JwtError, REFRESH_TOKEN_DURATION_SECS, TokenStatus, hash_token,
};
use crate::store::StoreError;

/// A freshly issued token pair whose refresh record is already stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub identity: Identity,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub refresh_hash: String,
}

impl IssuedSession {
    pub fn cookies(&self, secure: bool) -> [SetCookie; 2] {
        [
            SetCookie::new(ACCESS_COOKIE_NAME, self.access.token.as_str())
                .max_age(self.access.duration)
                .secure(secure),
            SetCookie::new(REFRESH_COOKIE_NAME, self.refresh.token.as_str())
                .max_age(self.refresh.duration)
                .secure(secure),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issue an access/refresh pair for `user` and record the refresh token.
/// The identity claim is taken from the user row, never from an older token.
pub async fn issue_session<S: HasAuthBackend>(
    state: &S,
    user: &User,
) -> Result<IssuedSession, SessionError> {
    let identity = Identity::from(user);
    let access = state.jwt().issue_access(&identity)?;
    let refresh = state.jwt().issue_refresh(&identity)?;
    let refresh_hash = hash_token(&refresh.token);

    state
        .tokens()
        .store(&refresh_hash, &identity.id, REFRESH_TOKEN_DURATION_SECS)
        .await?;

    Ok(IssuedSession {
        identity,
        access,
        refresh,
        refresh_hash,
    })
}

/// Outcome of presenting a live refresh token.
#[derive(Debug)]
pub enum Rotation {
    /// This caller consumed the refresh token and holds the new session.
    Rotated(IssuedSession),
    /// The token was live when checked, but a concurrent request consumed it
    /// first. The identity is confirmed; that request's session stands.
    Superseded(Identity),
}

/// Exchange a refresh token for a new session.
///
/// The new record is stored before the old one is revoked, so a store
/// failure leaves the old token usable. Revoking the old record decides who
/// rotated: only the caller whose revoke removed it keeps its new session,
/// any other caller's fresh record is discarded. Every failure reads as
/// `SessionExpired` to the caller.
pub async fn rotate<S: HasAuthBackend>(
    state: &S,
    refresh_token: &str,
) -> Result<Rotation, AuthErrorKind> {
    let claims = match state.jwt().verify_refresh(refresh_token) {
        TokenStatus::Valid(claims) => claims,
        TokenStatus::Expired => {
            debug!("Refresh token expired");
            return Err(AuthErrorKind::SessionExpired);
        }
        TokenStatus::Invalid => {
            warn!("Invalid refresh token presented");
            return Err(AuthErrorKind::SessionExpired);
        }
    };

    let old_hash = hash_token(refresh_token);

    let record = state
        .tokens()
        .check(&old_hash)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to check refresh token");
            AuthErrorKind::SessionExpired
        })?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "Refresh token not recorded");
            AuthErrorKind::SessionExpired
        })?;

    if record.user_id != claims.sub {
        warn!(
            user_id = %claims.sub,
            record_owner = %record.user_id,
            "Refresh token record belongs to another user"
        );
        return Err(AuthErrorKind::SessionExpired);
    }

    let user = state
        .db()
        .users()
        .get_by_id(&claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load user for rotation");
            AuthErrorKind::SessionExpired
        })?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "User no longer exists");
            AuthErrorKind::SessionExpired
        })?;

    let session = issue_session(state, &user).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "Failed to issue rotated session");
        AuthErrorKind::SessionExpired
    })?;

    match state.tokens().revoke(&old_hash).await {
        Ok(true) => {
            debug!(user_id = %user.id, "Session rotated");
            Ok(Rotation::Rotated(session))
        }
        Ok(false) => {
            debug!(user_id = %user.id, "Refresh token consumed by a concurrent request");
            discard_record(state, &session.refresh_hash).await;
            Ok(Rotation::Superseded(session.identity))
        }
        Err(e) => {
            error!(user_id = %user.id, error = %e, "Failed to revoke rotated refresh token");
            discard_record(state, &session.refresh_hash).await;
            Err(AuthErrorKind::SessionExpired)
        }
    }
}

/// Drop a refresh record that will never reach a client.
async fn discard_record<S: HasAuthBackend>(state: &S, token_hash: &str) {
    if let Err(e) = state.tokens().revoke(token_hash).await {
        warn!(error = %e, "Failed to discard unused refresh token record");
    }
}

/// Middleware guarding routes that need a session.
///
/// Use with `axum::middleware::from_fn_with_state`. Refusals here do not
/// clear cookies; the client is expected to call the refresh endpoint.
pub async fn require_session<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let Some(access_token) = get_cookie(request.headers(), ACCESS_COOKIE_NAME).map(str::to_owned)
    else {
        return ApiAuthError::new(AuthErrorKind::NotLoggedIn).into_response();
    };

    match state.jwt().verify_access(&access_token) {
        TokenStatus::Valid(claims) => {
            request.extensions_mut().insert(AuthenticatedUser {
                identity: claims.identity(),
                rotated_refresh_hash: None,
            });
            next.run(request).await
        }
        TokenStatus::Invalid => {
            warn!("Invalid access token presented");
            ApiAuthError::new(AuthErrorKind::SessionExpired).into_response()
        }
        TokenStatus::Expired => {
            let Some(refresh_token) =
                get_cookie(request.headers(), REFRESH_COOKIE_NAME).map(str::to_owned)
            else {
                debug!("Access token expired and no refresh token present");
                return ApiAuthError::new(AuthErrorKind::SessionExpired).into_response();
            };

            let session = match rotate(&state, &refresh_token).await {
                Ok(Rotation::Rotated(session)) => session,
                Ok(Rotation::Superseded(identity)) => {
                    request.extensions_mut().insert(AuthenticatedUser {
                        identity,
                        rotated_refresh_hash: None,
                    });
                    return next.run(request).await;
                }
                Err(kind) => return ApiAuthError::new(kind).into_response(),
            };

            info!(user_id = %session.identity.id, "Access token refreshed in middleware");

            request.extensions_mut().insert(AuthenticatedUser {
                identity: session.identity.clone(),
                rotated_refresh_hash: Some(session.refresh_hash.clone()),
            });

            let mut response = next.run(request).await;
            if sets_session_cookie(response.headers()) {
                // The handler ended or replaced the session.
                discard_record(&state, &session.refresh_hash).await;
            } else {
                append_cookies(
                    response.headers_mut(),
                    session.cookies(state.secure_cookies()),
                );
            }
            response
        }
    }
}
