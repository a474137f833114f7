//! Axum extractors for authenticated handlers.
//!
//! The session middleware does the token work; these only read what it
//! attached to the request and apply a role constraint.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::types::AuthenticatedUser;
use crate::jwt::Identity;

/// Role requirement checked against the identity claim.
pub trait RoleConstraint {
    fn allows(identity: &Identity) -> bool;
}

/// Any logged-in user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_identity: &Identity) -> bool {
        true
    }
}

/// Users whose token carries the admin flag.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(identity: &Identity) -> bool {
        identity.is_admin
    }
}

/// Extractor for handlers behind `require_session`.
pub struct Auth<R = AnyRole> {
    pub user: AuthenticatedUser,
    _role: PhantomData<fn() -> R>,
}

impl<R> Deref for Auth<R> {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ApiAuthError::new(AuthErrorKind::NotLoggedIn))?;

        if !R::allows(&user.identity) {
            tracing::debug!(user_id = %user.identity.id, "Role check failed");
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}
