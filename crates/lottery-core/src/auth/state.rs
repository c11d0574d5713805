//! Signed-in user state shared with the UI layer.
//!
//! Clearing the user is the "send them back to the login screen" signal:
//! the API client does it on every forced logout.

use tokio::sync::watch;
use tracing::debug;

use crate::models::{UserPatch, UserProfile};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
}

#[derive(Debug)]
pub struct AuthState {
    tx: watch::Sender<AuthSnapshot>,
}

impl AuthState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::default());
        Self { tx }
    }

    pub fn set_user(&self, user: UserProfile) {
        debug!(name = %user.name, "User signed in");
        self.tx.send_replace(AuthSnapshot {
            user: Some(user),
            is_authenticated: true,
        });
    }

    pub fn clear_user(&self) {
        debug!("User state cleared");
        self.tx.send_replace(AuthSnapshot::default());
    }

    /// Merge fields into the current user. No-op when nobody is signed in.
    pub fn update_user(&self, patch: UserPatch) {
        self.tx.send_if_modified(|snapshot| match snapshot.user.as_mut() {
            Some(user) => {
                patch.apply(user);
                true
            }
            None => false,
        });
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.tx.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Watch for sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
