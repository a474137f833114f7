//! Authentication user types.

use crate::jwt::Identity;

/// Identity attached to a request by the session middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    /// Hash of the refresh token issued while handling this request, if the
    /// middleware rotated the session.
    pub rotated_refresh_hash: Option<String>,
}

