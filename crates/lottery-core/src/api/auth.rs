//! Typed calls for the `/auth` endpoints.

use serde::Deserialize;
use tracing::{info, warn};

use crate::models::{ApiEnvelope, Credentials, TokenResponse, UserProfile};
use crate::notify::Severity;

use super::client::{LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
use super::{ApiClient, ApiError, RequestOptions};

/// `GET /auth` answers either wrapped in `{ data }` or with the bare profile.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped(ApiEnvelope<UserProfile>),
    Bare(UserProfile),
}

impl ProfileBody {
    fn into_profile(self) -> UserProfile {
        match self {
            ProfileBody::Wrapped(envelope) => envelope.into_data(),
            ProfileBody::Bare(profile) => profile,
        }
    }
}

/// Sign-in, registration and profile calls on top of [`ApiClient`].
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Sign in, store the issued pair and load the user's profile.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ApiError> {
        self.authenticate(LOGIN_PATH, credentials).await?;
        self.client.notifications.notify("Signed in", Severity::Success);
        self.profile().await
    }

    /// Create an account; the service signs the new user in directly.
    pub async fn register(&self, credentials: &Credentials) -> Result<UserProfile, ApiError> {
        self.authenticate(REGISTER_PATH, credentials).await?;
        self.client.notifications.notify("Account created", Severity::Success);
        self.profile().await
    }

    /// Fetch the signed-in user and publish it to the auth state.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let body: ProfileBody = self.client.request(PROFILE_PATH, RequestOptions::get()).await?;
        let profile = body.into_profile();
        self.client.auth_state.set_user(profile.clone());
        Ok(profile)
    }

    /// Trade the stored refresh token for a new pair without waiting for a 401.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.client.refresh_session().await
    }

    /// Forget both tokens and the signed-in user. Local only.
    pub fn logout(&self) {
        self.client.tokens.logout();
        self.client.auth_state.clear_user();
        self.client.notifications.notify("Signed out", Severity::Info);
    }

    async fn authenticate(&self, path: &str, credentials: &Credentials) -> Result<(), ApiError> {
        credentials.validate()?;

        let options = RequestOptions::post().json(credentials)?;
        let response: TokenResponse = self.client.request(path, options).await?;
        let Some(pair) = response.pair() else {
            warn!(path, ?response, "Token pair missing from response");
            return Err(ApiError::InvalidResponse(
                response.message().unwrap_or("response did not include both tokens").to_string(),
            ));
        };

        self.client.tokens.login(&pair.access_token, &pair.refresh_token)?;
        info!(username = %credentials.username, "Signed in");
        Ok(())
    }
}
