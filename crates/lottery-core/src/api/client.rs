//! API client for the lottery REST service.
//!
//! Every request carries `Authorization: Bearer <access token>`. When the
//! service answers 401 or 403 the client refreshes the token pair once and
//! replays the request once; the login and refresh endpoints are never
//! retried. Unrecoverable authorization failures clear the stored
//! credentials and the signed-in user.

use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthState, TokenFacade};
use crate::notify::NotificationCenter;

use super::refresh::{RefreshCoordinator, RefreshTask};
use super::request::{RequestBody, RequestOptions};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Prefix between the base URL and every endpoint path.
pub const DEFAULT_API_PREFIX: &str = "/v1/api";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const PROFILE_PATH: &str = "/auth";

/// Lets requests through ngrok tunnels used for staging backends.
const NGROK_SKIP_WARNING: &str = "ngrok-skip-browser-warning";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub timeout: Duration,
    /// Sent with every request, including refresh.
    pub default_headers: HeaderMap,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            HeaderName::from_static(NGROK_SKIP_WARNING),
            HeaderValue::from_static("true"),
        );

        Self {
            base_url: base_url.into(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL for an endpoint path such as `/auth/login`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path
        )
    }
}

/// Whether a failed call on `path` may go through refresh-and-replay.
fn is_retryable_path(path: &str) -> bool {
    !path.starts_with(REFRESH_PATH) && !path.starts_with(LOGIN_PATH)
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// API client for the lottery service.
/// Clone is cheap - every field is reference counted, and clones share the
/// connection pool and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<ClientConfig>,
    pub(crate) tokens: Arc<TokenFacade>,
    pub(crate) auth_state: Arc<AuthState>,
    pub(crate) notifications: Arc<NotificationCenter>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new API client around the application's shared services.
    pub fn new(
        config: ClientConfig,
        tokens: Arc<TokenFacade>,
        auth_state: Arc<AuthState>,
        notifications: Arc<NotificationCenter>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers.clone())
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("HTTP client could not be built: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens,
            auth_state,
            notifications,
            refresh: Arc::new(RefreshCoordinator::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenFacade> {
        &self.tokens
    }

    pub fn auth_state(&self) -> &Arc<AuthState> {
        &self.auth_state
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Call an endpoint and deserialize the response body.
    pub async fn request<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let body = self.execute(path, &options).await?;
        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(text).map_err(|e| {
            debug!(path, error = %e, body = %ApiError::truncate_body(&body), "Unexpected response shape");
            ApiError::InvalidResponse(format!("{} returned an unexpected body: {}", path, e))
        })
    }

    /// Call an endpoint and return the raw JSON body (`null` when empty).
    pub async fn request_value(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        self.request(path, options).await
    }

    /// Send, and on 401/403 refresh once and replay once.
    async fn execute(&self, path: &str, options: &RequestOptions) -> Result<String, ApiError> {
        let mut retried = false;

        loop {
            let token = self.tokens.access_token();
            let response = self.send(path, options, token.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                debug!(path, %status, retried, "Request succeeded");
                return Ok(response.text().await?);
            }

            let body = response.text().await.unwrap_or_default();
            debug!(path, %status, body = %ApiError::truncate_body(&body), "Request failed");

            if is_auth_rejection(status) && !retried && is_retryable_path(path) {
                self.refresh_after_rejection(token.as_deref()).await?;
                retried = true;
                debug!(path, "Replaying request with refreshed token");
                continue;
            }

            return Err(ApiError::from_status(status, &body));
        }
    }

    async fn send(&self, path: &str, options: &RequestOptions, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.config.url(path);

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.unwrap_or_default()))
            .map_err(|_| ApiError::InvalidRequest("stored access token is not a valid header value".to_string()))?;
        headers.insert(header::AUTHORIZATION, bearer);
        headers.extend(options.headers.clone());
        if !options.is_multipart() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut builder = self.http.request(options.method.clone(), &url).headers(headers);
        builder = match &options.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart(parts)) => builder.multipart(RequestBody::to_form(parts)?),
            None => builder,
        };

        debug!(method = %options.method, url = %url, has_token = token.is_some(), "Sending request");
        builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request did not reach the server");
            ApiError::Transport(e)
        })
    }

    /// Get a usable token after `rejected` was refused.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Result<(), ApiError> {
        if let Some(current) = self.tokens.access_token() {
            if rejected != Some(current.as_str()) {
                debug!("Access token was refreshed by another request");
                return Ok(());
            }
        }

        self.refresh_session().await
    }

    /// Exchange the stored refresh token for a new pair, joining a refresh
    /// already in flight. Failure signs the user out.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        let task = RefreshTask {
            http: self.http.clone(),
            url: self.config.url(REFRESH_PATH),
            tokens: Arc::clone(&self.tokens),
            auth_state: Arc::clone(&self.auth_state),
            notifications: Arc::clone(&self.notifications),
        };
        let refresh = self.refresh.join_or_start(move || task.run().boxed());
        refresh.await.map_err(ApiError::from)
    }
}
