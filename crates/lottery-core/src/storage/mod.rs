//! Key-value storage over two tiers.
//!
//! The session tier lives as long as the process; the persistent tier
//! survives restarts (a JSON file on disk, or the OS keychain). Values go
//! through [`Storage`], which writes plain strings verbatim and structured
//! values as JSON text, and reads JSON back with a raw-string fallback.

pub mod file;
pub mod keychain;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use file::FileBackend;
pub use keychain::KeyringBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// Cleared when the process exits.
    Session,
    /// Survives restarts.
    Persistent,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTier::Session => write!(f, "session"),
            StorageTier::Persistent => write!(f, "persistent"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("No data to save under '{0}'")]
    NullValue(String),
}

/// Raw string storage, shaped like a browser `Storage` object.
pub trait KeyValueBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Uniform get/set/remove over the session and persistent tiers.
#[derive(Clone)]
pub struct Storage {
    session: Arc<dyn KeyValueBackend>,
    persistent: Arc<dyn KeyValueBackend>,
}

impl Storage {
    pub fn new(session: Arc<dyn KeyValueBackend>, persistent: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            session,
            persistent,
        }
    }

    /// Both tiers in memory. Nothing outlives the process.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryBackend::new()),
        )
    }

    fn backend(&self, tier: StorageTier) -> &dyn KeyValueBackend {
        match tier {
            StorageTier::Session => self.session.as_ref(),
            StorageTier::Persistent => self.persistent.as_ref(),
        }
    }

    /// Save a value. Strings are stored as-is, everything else as JSON text.
    pub fn save(&self, key: &str, value: &Value, tier: StorageTier) -> Result<(), StorageError> {
        let encoded = match value {
            Value::Null => {
                warn!(key, %tier, "No data to save");
                return Err(StorageError::NullValue(key.to_string()));
            }
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        };
        self.backend(tier).set_item(key, &encoded)?;
        debug!(key, %tier, "Saved storage entry");
        Ok(())
    }

    /// Load a value. Missing keys and unreadable backends yield `None`; text
    /// that does not parse as JSON comes back as a string.
    pub fn load(&self, key: &str, tier: StorageTier) -> Option<Value> {
        let raw = match self.backend(tier).get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, %tier, error = %e, "Failed to read storage entry");
                return None;
            }
        };
        Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
    }

    pub fn remove(&self, key: &str, tier: StorageTier) -> Result<(), StorageError> {
        self.backend(tier).remove_item(key)?;
        debug!(key, %tier, "Removed storage entry");
        Ok(())
    }

    /// Serialize a typed value and save it.
    pub fn save_json<T: Serialize>(&self, key: &str, value: &T, tier: StorageTier) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.save(key, &value, tier)
    }

    /// Load and deserialize a typed value. A value of the wrong shape is
    /// treated like a missing one.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str, tier: StorageTier) -> Option<T> {
        let value = self.load(key, tier)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key, %tier, error = %e, "Storage entry has an unexpected shape");
                None
            }
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        volume: u8,
    }

    #[test]
    fn test_string_stored_verbatim() {
        let storage = Storage::in_memory();
        storage
            .save("token", &json!("abc.def"), StorageTier::Session)
            .expect("save");
        assert_eq!(storage.load("token", StorageTier::Session), Some(json!("abc.def")));
    }

    #[test]
    fn test_structured_values_round_trip() {
        let storage = Storage::in_memory();
        let value = json!({"state": {"refreshToken": "xyz"}, "version": 0});
        storage.save("auth-local", &value, StorageTier::Persistent).expect("save");
        assert_eq!(storage.load("auth-local", StorageTier::Persistent), Some(value));

        let list = json!(["a", "b"]);
        storage.save("recent", &list, StorageTier::Persistent).expect("save");
        assert_eq!(storage.load("recent", StorageTier::Persistent), Some(list));
    }

    #[test]
    fn test_missing_key_is_none() {
        let storage = Storage::in_memory();
        assert_eq!(storage.load("nothing", StorageTier::Session), None);
        assert_eq!(storage.load("nothing", StorageTier::Persistent), None);
    }

    #[test]
    fn test_unparseable_text_comes_back_raw() {
        let session = Arc::new(MemoryBackend::new());
        session.set_item("raw", "{not json").expect("set");
        let storage = Storage::new(session, Arc::new(MemoryBackend::new()));
        assert_eq!(storage.load("raw", StorageTier::Session), Some(json!("{not json")));
    }

    #[test]
    fn test_null_is_refused() {
        let storage = Storage::in_memory();
        let err = storage
            .save("empty", &Value::Null, StorageTier::Session)
            .expect_err("null must be refused");
        assert!(matches!(err, StorageError::NullValue(ref key) if key == "empty"));
        assert_eq!(storage.load("empty", StorageTier::Session), None);
    }

    #[test]
    fn test_tiers_are_isolated() {
        let storage = Storage::in_memory();
        storage.save("shared", &json!("session-value"), StorageTier::Session).expect("save");
        assert_eq!(storage.load("shared", StorageTier::Persistent), None);

        storage.save("other", &json!("persistent-value"), StorageTier::Persistent).expect("save");
        assert_eq!(storage.load("other", StorageTier::Session), None);

        storage.save("shared", &json!("persistent-value"), StorageTier::Persistent).expect("save");
        assert_eq!(storage.load("shared", StorageTier::Session), Some(json!("session-value")));

        storage.remove("shared", StorageTier::Session).expect("remove");
        assert_eq!(storage.load("shared", StorageTier::Session), None);
        assert_eq!(storage.load("shared", StorageTier::Persistent), Some(json!("persistent-value")));
    }

    #[test]
    fn test_typed_helpers() {
        let storage = Storage::in_memory();
        let prefs = Prefs { theme: "dark".to_string(), volume: 7 };
        storage.save_json("prefs", &prefs, StorageTier::Persistent).expect("save");
        assert_eq!(storage.load_json::<Prefs>("prefs", StorageTier::Persistent), Some(prefs));

        storage.save("prefs", &json!("not prefs"), StorageTier::Persistent).expect("save");
        assert_eq!(storage.load_json::<Prefs>("prefs", StorageTier::Persistent), None);
    }
}
