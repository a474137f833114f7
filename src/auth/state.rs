//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::store::TokenStore;

/// Trait for router state that can authenticate and rotate sessions.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn tokens(&self) -> &dyn TokenStore;
    fn secure_cookies(&self) -> bool;
}

/// Implement `HasAuthBackend` for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `db: Database`
/// - `jwt: Arc<JwtConfig>`
/// - `tokens: Arc<dyn TokenStore>`
/// - `secure_cookies: bool`
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub tokens: Arc<dyn TokenStore>,
///     pub secure_cookies: bool,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn tokens(&self) -> &dyn $crate::store::TokenStore {
                self.tokens.as_ref()
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
