//! Client core for the lottery web service.
//!
//! Holds the credential lifecycle (sealed token storage across a session
//! tier and a persistent tier), an HTTP client that refreshes expired
//! access tokens transparently, the signed-in user state and a single-slot
//! notification sink. Every service is constructed explicitly and shared by
//! `Arc`; nothing here is a global.

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod models;
pub mod notify;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthService, ClientConfig, RequestOptions};
pub use auth::{AuthState, TokenFacade};
pub use config::Config;
pub use crypto::{CredentialCodec, TokenCipher};
pub use notify::{NotificationCenter, Severity};
pub use storage::{Storage, StorageTier};
