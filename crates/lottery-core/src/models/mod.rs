//! Wire and domain types for the lottery API.
//!
//! - `Credentials`: username/password form, validated before submission
//! - `TokenPair`, `TokenResponse`: token payloads from login/register/refresh
//! - `ApiEnvelope`: the `{ data, message }` wrapper every endpoint returns
//! - `UserProfile`, `UserPatch`: the signed-in user

pub mod auth;
pub mod envelope;
pub mod user;

pub use auth::{Credentials, RefreshRequest, TokenPair, TokenResponse, ValidationError};
pub use envelope::ApiEnvelope;
pub use user::{UserPatch, UserProfile};
