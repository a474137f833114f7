#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
};
use rallypoint::{
    ServerConfig, create_app,
    db::{Database, NewUser, User},
    jwt::{ACCESS_TOKEN_DURATION_SECS, Identity, JwtConfig, REFRESH_TOKEN_DURATION_SECS, hash_token, now_secs},
    store::{MemoryTokenStore, RefreshTokenRecord, StoreError, TokenStore},
};
use serde_json::Value;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

/// Stored in place of a real hash for users that never log in with a password.
pub const NO_PASSWORD: &str = "unused";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
    pub tokens: Arc<dyn TokenStore>,
}

/// Test app backed by an in-memory database and the SQLite token store.
pub async fn create_test_app() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let tokens: Arc<dyn TokenStore> = Arc::new(db.tokens());
    create_test_app_with_store(db, tokens)
}

/// Test app using the in-memory token store.
pub async fn create_memory_store_app() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    create_test_app_with_store(db, Arc::new(MemoryTokenStore::new()))
}

pub fn create_test_app_with_store(db: Database, tokens: Arc<dyn TokenStore>) -> TestApp {
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        secure_cookies: false,
        token_store: tokens.clone(),
        ip_header: None,
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(JWT_SECRET),
        tokens,
    }
}

pub async fn create_user(db: &Database, username: &str, is_admin: bool) -> User {
    create_user_with_password(db, username, NO_PASSWORD, is_admin, false).await
}

pub async fn create_user_with_password(
    db: &Database,
    username: &str,
    password_hash: &str,
    is_admin: bool,
    must_change_password: bool,
) -> User {
    let id = uuid::Uuid::new_v4().to_string();
    db.users()
        .create(NewUser {
            id: &id,
            username,
            password_hash,
            is_admin,
            must_change_password,
        })
        .await
        .unwrap();
    db.users().get_by_id(&id).await.unwrap().unwrap()
}

pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn cookies(&self) -> String {
        auth_cookies(&self.access, &self.refresh)
    }

    pub fn refresh_hash(&self) -> String {
        hash_token(&self.refresh)
    }
}

/// Issue a token pair directly and record the refresh token.
pub async fn create_session(t: &TestApp, user: &User) -> Session {
    let identity = Identity::from(user);
    let access = t.jwt.issue_access(&identity).unwrap();
    let refresh = t.jwt.issue_refresh(&identity).unwrap();
    t.tokens
        .store(&hash_token(&refresh.token), &user.id, REFRESH_TOKEN_DURATION_SECS)
        .await
        .unwrap();
    Session {
        access: access.token,
        refresh: refresh.token,
    }
}

/// Like `create_session`, but the access token is already past its expiry.
pub async fn create_expired_session(t: &TestApp, user: &User) -> Session {
    let session = create_session(t, user).await;
    Session {
        access: expired_access_token(&t.jwt, user),
        refresh: session.refresh,
    }
}

pub fn expired_access_token(jwt: &JwtConfig, user: &User) -> String {
    let issued_at = now_secs().unwrap() - ACCESS_TOKEN_DURATION_SECS - 60;
    jwt.issue_access_at(&Identity::from(user), issued_at)
        .unwrap()
        .token
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refresh_token={}", refresh_token)
}

pub fn peer() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .extension(peer());
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_empty(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a non-cleared cookie named `name` among Set-Cookie headers.
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';').unwrap_or((c.as_str(), ""));
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Token store whose backend is down.
pub struct UnavailableStore;

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn store(&self, _: &str, _: &str, _: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn check(&self, _: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn revoke(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn list_for_user(&self, _: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn revoke_all_for_user(&self, _: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }
}

/// Delegating store whose `check` returns only once `n` checks are in, so
/// `n` concurrent rotations all see the refresh record before any revokes it.
pub struct LockstepStore {
    inner: Arc<dyn TokenStore>,
    barrier: tokio::sync::Barrier,
}

impl LockstepStore {
    pub fn new(inner: Arc<dyn TokenStore>, n: usize) -> Self {
        Self {
            inner,
            barrier: tokio::sync::Barrier::new(n),
        }
    }
}

#[async_trait]
impl TokenStore for LockstepStore {
    async fn store(&self, hash: &str, user_id: &str, ttl: u64) -> Result<(), StoreError> {
        self.inner.store(hash, user_id, ttl).await
    }

    async fn check(&self, hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = self.inner.check(hash).await;
        self.barrier.wait().await;
        record
    }

    async fn revoke(&self, hash: &str) -> Result<bool, StoreError> {
        self.inner.revoke(hash).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        self.inner.list_for_user(user_id).await
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.inner.purge_expired().await
    }
}

/// Delegating store where another request consumes every refresh record
/// right after it has been checked.
pub struct ContendedStore {
    inner: Arc<dyn TokenStore>,
}

impl ContendedStore {
    pub fn new(inner: Arc<dyn TokenStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TokenStore for ContendedStore {
    async fn store(&self, hash: &str, user_id: &str, ttl: u64) -> Result<(), StoreError> {
        self.inner.store(hash, user_id, ttl).await
    }

    async fn check(&self, hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = self.inner.check(hash).await?;
        self.inner.revoke(hash).await?;
        Ok(record)
    }

    async fn revoke(&self, hash: &str) -> Result<bool, StoreError> {
        self.inner.revoke(hash).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        self.inner.list_for_user(user_id).await
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.inner.purge_expired().await
    }
}
