//! Token refresh, coalesced across concurrent callers.
//!
//! When several requests see 401/403 at the same time they all await one
//! shared refresh future; only the first caller starts the network call.
//! Once that future resolves the slot is free for the next refresh.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{header, Client};
use tracing::{debug, info, warn};

use crate::auth::{AuthState, TokenFacade};
use crate::models::{RefreshRequest, TokenResponse};
use crate::notify::{NotificationCenter, Severity};

use super::ApiError;

/// Why a refresh could not produce new credentials. Shared between every
/// caller waiting on the same refresh, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshFailure {
    /// No usable refresh token was stored.
    SessionExpired,
    /// The refresh endpoint refused, or its answer was unusable.
    Rejected(String),
}

impl From<RefreshFailure> for ApiError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::SessionExpired => ApiError::SessionExpired,
            RefreshFailure::Rejected(message) => ApiError::RefreshFailed(message),
        }
    }
}

pub(crate) type RefreshResult = Result<(), RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Holds the refresh currently in flight, if any.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl RefreshCoordinator {
    /// Join the refresh in flight, or start one with `start`.
    pub(crate) fn join_or_start<F>(&self, start: F) -> SharedRefresh
    where
        F: FnOnce() -> BoxFuture<'static, RefreshResult>,
    {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = slot.as_ref() {
            if running.peek().is_none() {
                debug!("Joining token refresh already in flight");
                return running.clone();
            }
        }
        let refresh = start().shared();
        *slot = Some(refresh.clone());
        refresh
    }
}

/// Everything one refresh needs, owned so the future can be shared.
#[derive(Clone)]
pub(crate) struct RefreshTask {
    pub(crate) http: Client,
    pub(crate) url: String,
    pub(crate) tokens: Arc<TokenFacade>,
    pub(crate) auth_state: Arc<AuthState>,
    pub(crate) notifications: Arc<NotificationCenter>,
}

impl RefreshTask {
    /// Run the refresh. On failure the session is torn down exactly once,
    /// here, no matter how many callers are waiting.
    pub(crate) async fn run(self) -> RefreshResult {
        let result = self.exchange().await;
        if let Err(ref failure) = result {
            warn!(?failure, "Token refresh failed, signing out");
            self.tokens.logout();
            self.auth_state.clear_user();
            self.notifications
                .notify(ApiError::from(failure.clone()).user_message(), Severity::Error);
        }
        result
    }

    async fn exchange(&self) -> RefreshResult {
        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or(RefreshFailure::SessionExpired)?;

        debug!(url = %self.url, "Requesting new access token");
        let response = self
            .http
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshFailure::Rejected(format!("Token refresh failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            debug!(%status, body = %ApiError::truncate_body(&body), "Refresh endpoint rejected the request");
            let message = ApiError::server_message(&body)
                .unwrap_or_else(|| format!("Token refresh failed (HTTP {})", status.as_u16()));
            return Err(RefreshFailure::Rejected(message));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            debug!(error = %e, "Refresh response is not a token payload");
            RefreshFailure::Rejected("Token refresh failed: malformed response".to_string())
        })?;

        let Some(access_token) = parsed.access_token() else {
            let message = parsed.message().unwrap_or("Token refresh failed").to_string();
            return Err(RefreshFailure::Rejected(message));
        };

        self.tokens
            .store_refreshed(access_token, parsed.refresh_token())
            .map_err(|e| RefreshFailure::Rejected(format!("Token refresh failed: {}", e)))?;

        info!(rotated = parsed.refresh_token().is_some(), "Access token refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let coordinator = RefreshCoordinator::default();
        let starts = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let start = {
            let starts = Arc::clone(&starts);
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = release_rx.await;
                    Ok::<(), RefreshFailure>(())
                }
                .boxed()
            }
        };

        let first = coordinator.join_or_start(start);
        let second = coordinator.join_or_start(|| {
            starts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), RefreshFailure>(()) }.boxed()
        });

        let _ = release_tx.send(());
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finished_refresh_is_not_reused() {
        let coordinator = RefreshCoordinator::default();

        let first = coordinator.join_or_start(|| async { Err::<(), _>(RefreshFailure::SessionExpired) }.boxed());
        assert_eq!(first.await, Err(RefreshFailure::SessionExpired));

        let second = coordinator.join_or_start(|| async { Ok::<(), RefreshFailure>(()) }.boxed());
        assert_eq!(second.await, Ok(()));
    }

    #[test]
    fn test_failure_maps_to_api_error() {
        assert!(matches!(ApiError::from(RefreshFailure::SessionExpired), ApiError::SessionExpired));
        assert!(matches!(
            ApiError::from(RefreshFailure::Rejected("revoked".into())),
            ApiError::RefreshFailed(ref m) if m == "revoked"
        ));
    }
}
