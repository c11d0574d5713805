//! Symmetric sealing of credential strings before they reach storage.
//!
//! Tokens are encrypted with XChaCha20-Poly1305 under a key derived (Argon2id)
//! from an application secret compiled into the binary. Each ciphertext is
//! `base64(nonce || ciphertext || tag)` so it can live in text-only stores.
//!
//! Known limitation: the secret ships with the client. Sealing keeps tokens
//! out of casual view on a shared machine (a glance at the storage file or the
//! keychain) but is not a boundary against anyone who can read the binary.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::{debug, warn};

/// Fallback secret used when `LOTTERY_SECRET_KEY` is not set at build time.
const DEFAULT_APP_SECRET: &str = "lottery-web-client-default-secret";

/// Application secret, embedded at compile time.
pub const APP_SECRET: &str = match option_env!("LOTTERY_SECRET_KEY") {
    Some(secret) => secret,
    None => DEFAULT_APP_SECRET,
};

/// Fixed salt for key derivation. The secret is static, so the salt only
/// separates this key from other uses of the same secret.
const KDF_SALT: &[u8] = b"lottery-credential-codec-v1";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Argon2 cost: 4 MiB, 2 passes. The key is derived once per codec.
const KDF_MEMORY_KIB: u32 = 4 * 1024;
const KDF_ITERATIONS: u32 = 2;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to derive credential key: {0}")]
    KeyDerivation(String),
}

/// Seals and opens token strings.
///
/// Both directions fail soft: `None` means "credential unusable". Callers must
/// never fall back to an empty token when they get `None`.
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Option<String>;
    fn decrypt(&self, ciphertext: &str) -> Option<String>;
}

/// XChaCha20-Poly1305 codec keyed from the application secret.
#[derive(Clone)]
pub struct CredentialCodec {
    key: Key,
}

impl CredentialCodec {
    /// Build a codec from the secret compiled into this binary.
    pub fn from_app_secret() -> Result<Self, CodecError> {
        Self::new(APP_SECRET)
    }

    /// Build a codec from an explicit secret.
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, 1, Some(KEY_LEN))
            .map_err(|e| CodecError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(secret.as_bytes(), KDF_SALT, &mut key)
            .map_err(|e| CodecError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            key: Key::clone_from_slice(&key),
        })
    }
}

impl TokenCipher for CredentialCodec {
    fn encrypt(&self, plaintext: &str) -> Option<String> {
        let cipher = XChaCha20Poly1305::new(&self.key);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        match cipher.encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes()) {
            Ok(sealed) => {
                let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&sealed);
                Some(STANDARD.encode(out))
            }
            Err(e) => {
                warn!(error = %e, "Credential encryption failed");
                None
            }
        }
    }

    fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let raw = match STANDARD.decode(ciphertext.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Stored credential is not valid base64");
                return None;
            }
        };

        if raw.len() < NONCE_LEN + TAG_LEN {
            debug!(len = raw.len(), "Stored credential is too short");
            return None;
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(&self.key);
        let opened = match cipher.decrypt(XNonce::from_slice(nonce), sealed) {
            Ok(opened) => opened,
            Err(_) => {
                warn!("Credential decryption failed - stored value was altered or sealed with another key");
                return None;
            }
        };

        match String::from_utf8(opened) {
            Ok(plaintext) => Some(plaintext),
            Err(_) => {
                warn!("Decrypted credential is not valid UTF-8");
                None
            }
        }
    }
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CredentialCodec {
        CredentialCodec::new("test-secret").expect("codec")
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        for plaintext in ["eyJhbGciOiJIUzI1NiJ9.payload.sig", "", "vé ső 🎟️", " padded "] {
            let sealed = codec.encrypt(plaintext).expect("encrypt");
            assert_ne!(sealed, plaintext);
            assert_eq!(codec.decrypt(&sealed).as_deref(), Some(plaintext));
        }
    }

    #[test]
    fn test_same_plaintext_seals_differently() {
        let codec = codec();
        let a = codec.encrypt("token").expect("encrypt");
        let b = codec.encrypt("token").expect("encrypt");
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let codec = codec();
        let sealed = codec.encrypt("refresh-token").expect("encrypt");

        let mut raw = STANDARD.decode(&sealed).expect("base64");
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(codec.decrypt(&STANDARD.encode(&raw)), None);

        let mut raw = STANDARD.decode(&sealed).expect("base64");
        raw[NONCE_LEN] ^= 0x80;
        assert_eq!(codec.decrypt(&STANDARD.encode(&raw)), None);
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let codec = codec();
        assert_eq!(codec.decrypt(""), None);
        assert_eq!(codec.decrypt("not base64 at all!"), None);
        assert_eq!(codec.decrypt("plain-token"), None);
        assert_eq!(codec.decrypt(&STANDARD.encode([0u8; 10])), None);
    }

    #[test]
    fn test_other_secret_cannot_open() {
        let sealed = codec().encrypt("token").expect("encrypt");
        let other = CredentialCodec::new("another-secret").expect("codec");
        assert_eq!(other.decrypt(&sealed), None);
    }

    #[test]
    fn test_same_secret_derives_same_key() {
        let sealed = codec().encrypt("token").expect("encrypt");
        assert_eq!(codec().decrypt(&sealed).as_deref(), Some("token"));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("redacted"));
    }
}
