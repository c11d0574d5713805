//! REST client for the lottery service.
//!
//! `ApiClient` injects the bearer token into every call and recovers from
//! an expired access token by refreshing once and replaying the call.
//! `AuthService` wraps the `/auth` endpoints on top of it.

pub mod auth;
pub mod client;
pub mod error;
pub(crate) mod refresh;
pub mod request;

pub use auth::AuthService;
pub use client::{ApiClient, ClientConfig, DEFAULT_API_PREFIX, DEFAULT_TIMEOUT_SECS};
pub use error::ApiError;
pub use request::{FormPart, RequestBody, RequestOptions};
