//! Cookie-based session authentication.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless) and
//! long-lived refresh tokens (7 days, recorded in the token store). Expired
//! access tokens are rotated transparently by `require_session`.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod session;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SetCookie, append_cookies, cleared_session_cookies,
    get_cookie, sets_session_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use ip::extract_client_ip;
pub use session::{
    IssuedSession, Rotation, SessionError, issue_session, require_session, rotate,
};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
