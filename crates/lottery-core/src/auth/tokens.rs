//! Access/refresh token pair, sealed at rest.
//!
//! The access token lives in the session tier under `auth-session`, the
//! refresh token in the persistent tier under `auth-local`. Both are stored
//! only as ciphertext; plaintext exists in memory while a request or refresh
//! is in progress.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::TokenCipher;
use crate::storage::{Storage, StorageError, StorageTier};

/// Session-tier key holding the sealed access token.
pub const ACCESS_TOKEN_KEY: &str = "auth-session";

/// Persistent-tier key holding the sealed refresh token.
pub const REFRESH_TOKEN_KEY: &str = "auth-local";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to encrypt access token or refresh token")]
    Encryption,

    #[error("Failed to persist credentials: {0}")]
    Storage(#[from] StorageError),
}

/// On-disk layout of one token entry: `{"state": {...}, "version": 0}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedEntry {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Access,
    Refresh,
}

impl Slot {
    fn key(self) -> &'static str {
        match self {
            Slot::Access => ACCESS_TOKEN_KEY,
            Slot::Refresh => REFRESH_TOKEN_KEY,
        }
    }

    fn tier(self) -> StorageTier {
        match self {
            Slot::Access => StorageTier::Session,
            Slot::Refresh => StorageTier::Persistent,
        }
    }

    fn entry(self, sealed: String) -> PersistedEntry {
        let state = match self {
            Slot::Access => PersistedState { access_token: Some(sealed), ..Default::default() },
            Slot::Refresh => PersistedState { refresh_token: Some(sealed), ..Default::default() },
        };
        PersistedEntry { state, version: 0 }
    }

    fn sealed_from(self, entry: PersistedEntry) -> Option<String> {
        match self {
            Slot::Access => entry.state.access_token,
            Slot::Refresh => entry.state.refresh_token,
        }
    }
}

/// Owns the credential pair. Constructed once at the application root and
/// shared by `Arc`.
pub struct TokenFacade {
    storage: Arc<Storage>,
    cipher: Arc<dyn TokenCipher>,
}

impl TokenFacade {
    pub fn new(storage: Arc<Storage>, cipher: Arc<dyn TokenCipher>) -> Self {
        Self { storage, cipher }
    }

    /// Seal and store both tokens. Nothing is written unless both seal.
    pub fn login(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let (Some(sealed_access), Some(sealed_refresh)) = (
            self.cipher.encrypt(access_token),
            self.cipher.encrypt(refresh_token),
        ) else {
            warn!("Refusing to store credentials - encryption failed");
            return Err(AuthError::Encryption);
        };

        let previous_access = self.storage.load(Slot::Access.key(), Slot::Access.tier());
        self.write(Slot::Access, sealed_access)?;
        if let Err(e) = self.write(Slot::Refresh, sealed_refresh) {
            // Put the session tier back the way it was.
            self.restore(Slot::Access, previous_access);
            return Err(e);
        }

        info!("Stored new credential pair");
        Ok(())
    }

    /// Store the result of a refresh. When the server did not rotate the
    /// refresh token, the current one is kept.
    pub fn store_refreshed(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), AuthError> {
        match refresh_token {
            Some(refresh_token) => self.login(access_token, refresh_token),
            None => {
                let sealed = self.cipher.encrypt(access_token).ok_or(AuthError::Encryption)?;
                self.write(Slot::Access, sealed)?;
                info!("Stored refreshed access token, keeping current refresh token");
                Ok(())
            }
        }
    }

    /// Clear both tiers. Safe to call repeatedly.
    pub fn logout(&self) {
        self.clear(Slot::Access);
        self.clear(Slot::Refresh);
        info!("Cleared stored credentials");
    }

    /// Current access token, or `None` if absent or unreadable.
    pub fn access_token(&self) -> Option<String> {
        self.read(Slot::Access)
    }

    /// Current refresh token, or `None` if absent or unreadable.
    pub fn refresh_token(&self) -> Option<String> {
        self.read(Slot::Refresh)
    }

    /// Whether a usable refresh token is stored, i.e. the session can be resumed.
    pub fn has_session(&self) -> bool {
        self.refresh_token().is_some()
    }

    fn write(&self, slot: Slot, sealed: String) -> Result<(), AuthError> {
        self.storage.save_json(slot.key(), &slot.entry(sealed), slot.tier())?;
        Ok(())
    }

    fn clear(&self, slot: Slot) {
        if let Err(e) = self.storage.remove(slot.key(), slot.tier()) {
            warn!(key = slot.key(), error = %e, "Failed to clear stored token");
        }
    }

    fn restore(&self, slot: Slot, previous: Option<serde_json::Value>) {
        match previous {
            Some(entry) => {
                if let Err(e) = self.storage.save(slot.key(), &entry, slot.tier()) {
                    warn!(key = slot.key(), error = %e, "Failed to restore previous token");
                    self.clear(slot);
                }
            }
            None => self.clear(slot),
        }
    }

    fn read(&self, slot: Slot) -> Option<String> {
        let sealed = match self.storage.load(slot.key(), slot.tier())? {
            serde_json::Value::String(sealed) => sealed,
            value => {
                let entry: PersistedEntry = serde_json::from_value(value).ok()?;
                slot.sealed_from(entry)?
            }
        };

        let token = self.cipher.decrypt(&sealed);
        if token.is_none() {
            debug!(key = slot.key(), "Stored token could not be decrypted");
        }
        token
    }
}

impl fmt::Debug for TokenFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFacade")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
