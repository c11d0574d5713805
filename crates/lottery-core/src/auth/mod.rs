//! Authentication state for the client.
//!
//! This module provides:
//! - `TokenFacade`: the access/refresh token pair, sealed at rest across the
//!   session and persistent storage tiers
//! - `AuthState`: who is signed in, observable by the UI layer

pub mod state;
pub mod tokens;

pub use state::{AuthSnapshot, AuthState};
pub use tokens::{AuthError, TokenFacade, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
