//! Application state and command handlers.
//!
//! `App` owns every service for the lifetime of one command: storage, the
//! token facade, the signed-in user, the notification slot and the API
//! client. Results reach the user through the notification slot.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use lottery_core::api::{ApiClient, ApiError, AuthService};
use lottery_core::auth::{AuthState, TokenFacade};
use lottery_core::config::Config;
use lottery_core::crypto::CredentialCodec;
use lottery_core::models::{Credentials, UserProfile};
use lottery_core::notify::{NotificationCenter, Severity};

pub struct App {
    config: Config,
    auth: AuthService,
    tokens: Arc<TokenFacade>,
    auth_state: Arc<AuthState>,
    notifications: Arc<NotificationCenter>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let storage = Arc::new(config.open_storage().context("Failed to open credential storage")?);
        let codec = CredentialCodec::from_app_secret().context("Failed to initialise credential encryption")?;
        let tokens = Arc::new(TokenFacade::new(storage, Arc::new(codec)));
        let auth_state = Arc::new(AuthState::new());
        let notifications = Arc::new(NotificationCenter::new());

        let client = ApiClient::new(
            config.client_config(),
            Arc::clone(&tokens),
            Arc::clone(&auth_state),
            Arc::clone(&notifications),
        )
        .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            auth: AuthService::new(client),
            tokens,
            auth_state,
            notifications,
        })
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let credentials = self.prompt_credentials(username)?;
        let result = self.auth.login(&credentials).await;
        self.finish_sign_in(&credentials, result)
    }

    pub async fn register(&mut self, username: Option<String>) -> Result<()> {
        let credentials = self.prompt_credentials(username)?;
        let result = self.auth.register(&credentials).await;
        self.finish_sign_in(&credentials, result)
    }

    pub async fn profile(&self) -> Result<()> {
        let user = self.auth.profile().await.map_err(|e| self.report(e))?;
        println!("{}", user.display());
        if let Some(ref id) = user.id {
            println!("id: {}", id);
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.auth.logout();
        self.show_notification();
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        println!("API: {}", self.auth.client().config().url(""));
        if self.tokens.has_session() {
            println!("Session: stored ({:?} backend)", self.config.persistent_backend);
        } else {
            println!("Session: not signed in");
        }
        if let Some(ref username) = self.config.last_username {
            println!("Last user: {}", username);
        }
        Ok(())
    }

    fn finish_sign_in(
        &mut self,
        credentials: &Credentials,
        result: Result<UserProfile, ApiError>,
    ) -> Result<()> {
        let user = result.map_err(|e| self.report(e))?;

        self.config.last_username = Some(credentials.username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.show_notification();
        println!("Signed in as {}", user.display());
        debug!(authenticated = self.auth_state.is_authenticated(), "Sign-in finished");
        Ok(())
    }

    /// Post the failure to the notification slot and turn it into the
    /// error printed by `main`.
    fn report(&self, err: ApiError) -> anyhow::Error {
        warn!(error = %err, "Command failed");
        self.notifications.notify(err.user_message(), Severity::Error);
        anyhow::anyhow!(self.notifications.snapshot().message)
    }

    fn show_notification(&self) {
        let note = self.notifications.snapshot();
        if note.open {
            println!("{}", note.message);
            self.notifications.stop_notify();
        }
    }

    fn prompt_credentials(&self, username: Option<String>) -> Result<Credentials> {
        let username = match username {
            Some(username) => username,
            None => Self::prompt_username(self.config.last_username.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        Ok(Credentials::new(username, password))
    }

    fn prompt_username(default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => print!("Username [{}]: ", default),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let mut username = String::new();
        io::stdin().read_line(&mut username)?;
        let username = username.trim();
        Ok(match (username.is_empty(), default) {
            (true, Some(default)) => default.to_string(),
            _ => username.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(server: &MockServer, data_dir: &std::path::Path) -> App {
        let config = Config {
            api_url: server.uri(),
            data_dir: Some(data_dir.to_path_buf()),
            ..Config::default()
        };
        App::new(config).expect("app")
    }

    #[tokio::test]
    async fn test_profile_in_new_process_refreshes_first() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        // Previous run: signed in, access token gone with the process.
        {
            let app = app_for(&server, dir.path());
            app.tokens.login("old-A", "old-R").expect("login");
        }

        Mock::given(method("GET"))
            .and(path("/v1/api/auth"))
            .and(header("Authorization", "Bearer new-A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "Lan"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/api/auth"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/api/auth/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"accessToken": "new-A"}})))
            .expect(1)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        assert_eq!(app.tokens.access_token(), None);
        app.profile().await.expect("profile");
        assert!(app.auth_state.is_authenticated());
        assert_eq!(app.tokens.refresh_token().as_deref(), Some("old-R"));
    }

    #[tokio::test]
    async fn test_expired_session_reports_notification_message() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path("/v1/api/auth"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        let err = app.profile().await.expect_err("no session");
        assert_eq!(err.to_string(), "Your session has expired. Please sign in again.");
        assert_eq!(app.notifications.snapshot().severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_logout_clears_persisted_session() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        let app = app_for(&server, dir.path());
        app.tokens.login("A", "R").expect("login");
        app.logout().expect("logout");
        assert!(!app.notifications.snapshot().open);

        let reopened = app_for(&server, dir.path());
        assert!(!reopened.tokens.has_session());
    }
}
