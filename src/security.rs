// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Key material and the security provider seam.
//!
//! The key hierarchy has two tiers:
//!
//! - A **control key** is an Ed25519 key pair whose private half is sealed under a
//!   secret derived from the user's password. It never encrypts field data itself.
//! - A **data key** is a random symmetric key, wrapped by its control key and signed
//!   with it. The data keys of one control key form its [`CipherSet`], which is what
//!   encrypts and decrypts field values.
//!
//! Where the key pair comes from, and how a password turns into a secret, is the
//! job of a [`SecurityProvider`]. The crate ships [`PasswordSecurity`].
use crate::Result;
use thiserror::Error;

mod cipher;
pub use cipher::{CipherSet, KEY_LEN, SymmetricCipher};
mod provider;
pub use provider::{PasswordSecurity, SecurityControl};

crate::static_data! {
    /// Symmetric algorithms a data key can be for.
    pub enum SymKeyType: "symmetric key type" {
        Aes256Gcm = 1 => "AES-256-GCM",
        XChaCha20Poly1305 = 2 => "XChaCha20-Poly1305",
    }
}

crate::static_data! {
    /// Which symmetric algorithms a control key generates data keys for.
    pub enum CipherMode: "cipher mode" {
        /// A single AES-256-GCM data key.
        Single = 1 => "single cipher",
        /// AES-256-GCM and XChaCha20-Poly1305; each encryption picks one at random.
        Dual = 2 => "dual cipher",
    }
}

impl CipherMode {
    /// The data key types a control key in this mode carries.
    pub const fn key_types(self) -> &'static [SymKeyType] {
        match self {
            CipherMode::Single => &[SymKeyType::Aes256Gcm],
            CipherMode::Dual => &[SymKeyType::Aes256Gcm, SymKeyType::XChaCha20Poly1305],
        }
    }
}

/// Errors raised by the cryptographic layer.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("password does not match the stored hash")]
    PasswordMismatch,

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("signature verification failed")]
    BadSignature,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("expected a {expected} byte key, got {actual} bytes")]
    KeyLength { expected: usize, actual: usize },

    #[error("no cipher registered for algorithm id {0}")]
    UnknownCipher(u8),

    #[error("cipher set is empty")]
    NoCiphers,

    #[error("failed to decode {kind} from {len} plaintext bytes")]
    Decode { kind: &'static str, len: usize },
}

/// Runtime security settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Mode used for newly created control keys.
    pub mode: CipherMode,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: CipherMode::Dual,
        }
    }
}

/// The persisted form of a control key, as read back from a backing store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredControl {
    pub password_hash: Vec<u8>,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
    pub mode: CipherMode,
}

impl std::fmt::Debug for StoredControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredControl")
            .field("public_key", &self.public_key.len())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Source of control key material.
pub trait SecurityProvider {
    /// Creates the key material for a brand new control key.
    fn new_control(&self) -> Result<SecurityControl>;

    /// Unlocks the key material of a stored control key.
    ///
    /// # Errors
    ///
    /// Fails with [`SecurityError::PasswordMismatch`] if the provider's credentials
    /// do not open `stored`.
    fn resolve_control(&self, stored: &StoredControl) -> Result<SecurityControl>;

    /// Creates a new control key that shares `existing`'s password secret.
    fn clone_control(&self, existing: &SecurityControl) -> Result<SecurityControl> {
        Ok(existing.clone_with_same_password()?)
    }
}
