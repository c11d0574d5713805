use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum username length accepted by the sign-in form.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum password length accepted by the sign-in form.
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username is required")]
    UsernameRequired,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Username must be at most 50 characters")]
    UsernameTooLong,

    #[error("Password must be at most 128 characters")]
    PasswordTooLong,

    #[error("{0} contains control characters")]
    ControlCharacters(&'static str),
}

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials, trimming surrounding whitespace from the username.
    pub fn new(username: impl AsRef<str>, password: impl Into<String>) -> Self {
        Self {
            username: username.as_ref().trim().to_string(),
            password: password.into(),
        }
    }

    /// Check the form before anything is sent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::UsernameRequired);
        }
        if self.password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        if self.username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(ValidationError::UsernameTooLong);
        }
        if self.password.chars().count() > MAX_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooLong);
        }
        if self.username.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacters("Username"));
        }
        if self.password.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacters("Password"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/refresh-token`. Sent without an Authorization header.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// A complete access/refresh token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenFields {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Token payload from login, register and refresh.
///
/// The service wraps tokens as `{ "data": { accessToken, refreshToken } }`;
/// a bare `{ accessToken, refreshToken }` object is accepted too. Refresh
/// responses may omit the refresh token.
#[derive(Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    data: Option<TokenFields>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    inline: TokenFields,
}

impl TokenResponse {
    fn pick(&self, field: impl Fn(&TokenFields) -> Option<&String>) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(&field)
            .or_else(|| field(&self.inline))
            .map(String::as_str)
            .filter(|token| !token.is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.pick(|f| f.access_token.as_ref())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.pick(|f| f.refresh_token.as_ref())
    }

    /// Server-provided message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Both tokens, or `None` when either is missing.
    pub fn pair(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access_token: self.access_token()?.to_string(),
            refresh_token: self.refresh_token()?.to_string(),
        })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("has_access_token", &self.access_token().is_some())
            .field("has_refresh_token", &self.refresh_token().is_some())
            .field("message", &self.message)
            .finish()
    }
}
