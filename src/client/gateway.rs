//! Client request gateway.
//!
//! Sends requests through a `Transport` and recovers from a 401 by refreshing
//! the session once and replaying the request once. Concurrent 401s share a
//! single refresh through the `RefreshCoordinator`.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::single_flight::{RefreshCoordinator, RefreshOutcome, Ticket, wait_for};
use super::transport::{ApiRequest, ApiResponse, ClientError, Transport};

pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Where the user is and how to send them to the login page.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect_to_login(&self, location: &str);
}

/// Navigator for headless use: logs the redirect instead of performing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn redirect_to_login(&self, location: &str) {
        info!(location = %location, "Session expired, login required");
    }
}

pub struct Gateway<T> {
    transport: T,
    coordinator: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    refresh_path: String,
    login_path: String,
}

impl<T: Transport> Gateway<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            coordinator: Arc::new(RefreshCoordinator::new()),
            navigator: Arc::new(LoggingNavigator),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send a request.
    ///
    /// Non-401 responses and transport errors pass through. A 401 from the
    /// refresh endpoint itself is returned as is. Any other 401 triggers (or
    /// joins) a refresh; on success the request is replayed exactly once and
    /// the replay's response is returned whatever its status.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.transport.execute(&request).await?;

        if response.status != StatusCode::UNAUTHORIZED || self.is_refresh_path(&request.path) {
            return Ok(response);
        }

        debug!(path = %request.path, "Got 401, refreshing session");
        match self.refresh().await {
            RefreshOutcome::Refreshed => self.transport.execute(&request).await,
            RefreshOutcome::Failed => Err(ClientError::SessionExpired),
        }
    }

    /// Refresh the session, sharing an in-flight refresh if there is one.
    /// On failure the leader sends the user to the login page.
    pub async fn refresh(&self) -> RefreshOutcome {
        let guard = match self.coordinator.join() {
            Ticket::Leader(guard) => guard,
            Ticket::Follower(receiver) => return wait_for(receiver).await,
        };

        let request = ApiRequest::post(self.refresh_path.as_str(), None);
        let outcome = match self.transport.execute(&request).await {
            Ok(response) if response.status.is_success() => RefreshOutcome::Refreshed,
            Ok(response) => {
                debug!(status = %response.status, "Refresh rejected");
                RefreshOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "Refresh request failed");
                RefreshOutcome::Failed
            }
        };

        guard.complete(outcome);

        if outcome == RefreshOutcome::Failed {
            self.redirect_to_login();
        }
        outcome
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::post(path, Some(body))).await
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path == self.refresh_path
    }

    fn redirect_to_login(&self) {
        let current = self.navigator.current_path();
        let encoded: String = url::form_urlencoded::byte_serialize(current.as_bytes()).collect();
        let location = format!("{}?redirect={}", self.login_path, encoded);
        self.navigator.redirect_to_login(&location);
    }
}
