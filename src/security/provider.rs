// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{
    CipherMode, KEY_LEN, SecurityConfig, SecurityError, SecurityProvider, StoredControl,
    SymKeyType, SymmetricCipher,
};
use crate::Result;
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, SigningKey, Verifier};
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const VERIFIER_LEN: usize = 32;
const VERIFIER_INFO: &[u8] = b"verdata password verifier v1";
const SECRET_INFO: &[u8] = b"verdata password secret v1";
const WRAP_INFO: &[u8] = b"verdata data key wrapping v1";

type Secret = Zeroizing<[u8; KEY_LEN]>;

fn expand(hkdf: &Hkdf<Sha256>, info: &[u8]) -> Result<Secret, SecurityError> {
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(info, &mut okm[..])
        .map_err(|_| SecurityError::KeyDerivation)?;
    Ok(okm)
}

/// Unlocked key material of one control key.
///
/// Holds the password-derived secret, the signing key and the persisted forms of
/// both. Everything secret is zeroed on drop.
#[derive(Clone)]
pub struct SecurityControl {
    password_hash: Vec<u8>,
    secret: Secret,
    signing_key: SigningKey,
    private_key: Vec<u8>,
    mode: CipherMode,
}

impl SecurityControl {
    /// Generates a fresh key pair and seals it under `secret`.
    fn generate(password_hash: Vec<u8>, secret: Secret, mode: CipherMode) -> Result<Self, SecurityError> {
        let seed: Secret = Zeroizing::new(rand::random());
        let signing_key = SigningKey::from_bytes(&seed);
        let private_key = SymmetricCipher::new(SymKeyType::Aes256Gcm, &secret[..])?
            .encrypt(&Zeroizing::new(signing_key.to_bytes())[..])?;
        Ok(Self {
            password_hash,
            secret,
            signing_key,
            private_key,
            mode,
        })
    }

    /// Salt followed by the password verifier.
    pub fn password_hash(&self) -> &[u8] {
        &self.password_hash
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The private key, sealed under the password secret.
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn stored(&self) -> StoredControl {
        StoredControl {
            password_hash: self.password_hash.clone(),
            public_key: self.public_key().to_vec(),
            private_key: self.private_key.clone(),
            mode: self.mode,
        }
    }

    /// New key pair, same password.
    pub fn clone_with_same_password(&self) -> Result<Self, SecurityError> {
        Self::generate(self.password_hash.clone(), self.secret.clone(), self.mode)
    }

    fn wrapping_cipher(&self) -> Result<SymmetricCipher, SecurityError> {
        let seed = Zeroizing::new(self.signing_key.to_bytes());
        let key = expand(&Hkdf::<Sha256>::new(None, &seed[..]), WRAP_INFO)?;
        SymmetricCipher::new(SymKeyType::XChaCha20Poly1305, &key[..])
    }

    /// Encrypts `key` for storage and signs the result.
    pub fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let mut blob = self.wrapping_cipher()?.encrypt(key)?;
        let signature = self.signing_key.sign(&blob);
        blob.extend_from_slice(&signature.to_bytes());
        Ok(blob)
    }

    /// Verifies and decrypts a blob produced by [`SecurityControl::wrap_key`].
    ///
    /// # Errors
    ///
    /// Fails with [`SecurityError::BadSignature`] if the blob was not signed by
    /// this control key.
    pub fn unwrap_key(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, SecurityError> {
        if blob.len() < SIGNATURE_LENGTH {
            return Err(SecurityError::Malformed("wrapped key"));
        }
        let (body, signature) = blob.split_at(blob.len() - SIGNATURE_LENGTH);
        let signature =
            Signature::from_slice(signature).map_err(|_| SecurityError::BadSignature)?;
        self.signing_key
            .verifying_key()
            .verify(body, &signature)
            .map_err(|_| SecurityError::BadSignature)?;
        Ok(Zeroizing::new(self.wrapping_cipher()?.decrypt(body)?))
    }

    /// Generates a random symmetric key, returning its cipher and wrapped form.
    pub fn new_symmetric_key(
        &self,
        key_type: SymKeyType,
    ) -> Result<(SymmetricCipher, Vec<u8>), SecurityError> {
        let key: Secret = Zeroizing::new(rand::random());
        let cipher = SymmetricCipher::new(key_type, &key[..])?;
        Ok((cipher, self.wrap_key(&key[..])?))
    }

    /// Rebuilds the cipher of a stored data key.
    pub fn unwrap_symmetric_key(
        &self,
        key_type: SymKeyType,
        secured: &[u8],
    ) -> Result<SymmetricCipher, SecurityError> {
        let key = self.unwrap_key(secured)?;
        SymmetricCipher::new(key_type, &key)
    }
}

impl fmt::Debug for SecurityControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityControl")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// A [`SecurityProvider`] keyed by a password.
///
/// The password is stretched with HKDF-SHA256 over a random salt into a verifier,
/// which is stored, and a secret, which seals the control key's private key.
pub struct PasswordSecurity {
    password: Zeroizing<String>,
    config: SecurityConfig,
}

impl PasswordSecurity {
    pub fn new(password: impl Into<String>) -> Self {
        Self::with_config(password, SecurityConfig::default())
    }

    pub fn with_config(password: impl Into<String>, config: SecurityConfig) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            config,
        }
    }

    fn derive(&self, salt: &[u8]) -> Result<(Secret, Secret), SecurityError> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), self.password.as_bytes());
        Ok((expand(&hkdf, VERIFIER_INFO)?, expand(&hkdf, SECRET_INFO)?))
    }
}

impl SecurityProvider for PasswordSecurity {
    fn new_control(&self) -> Result<SecurityControl> {
        let salt: [u8; SALT_LEN] = rand::random();
        let (verifier, secret) = self.derive(&salt)?;
        let mut password_hash = Vec::with_capacity(SALT_LEN + VERIFIER_LEN);
        password_hash.extend_from_slice(&salt);
        password_hash.extend_from_slice(&verifier[..]);
        Ok(SecurityControl::generate(
            password_hash,
            secret,
            self.config.mode,
        )?)
    }

    fn resolve_control(&self, stored: &StoredControl) -> Result<SecurityControl> {
        if stored.password_hash.len() != SALT_LEN + VERIFIER_LEN {
            return Err(SecurityError::Malformed("password hash").into());
        }
        let (salt, expected) = stored.password_hash.split_at(SALT_LEN);
        let (verifier, secret) = self.derive(salt)?;
        if verifier[..] != *expected {
            return Err(SecurityError::PasswordMismatch.into());
        }

        let opened = Zeroizing::new(
            SymmetricCipher::new(SymKeyType::Aes256Gcm, &secret[..])?.decrypt(&stored.private_key)?,
        );
        let seed: Secret = Zeroizing::new(
            opened[..]
                .try_into()
                .map_err(|_| SecurityError::Malformed("private key"))?,
        );
        let signing_key = SigningKey::from_bytes(&seed);
        if signing_key.verifying_key().to_bytes()[..] != stored.public_key[..] {
            return Err(SecurityError::Malformed("public key").into());
        }

        Ok(SecurityControl {
            password_hash: stored.password_hash.clone(),
            secret,
            signing_key,
            private_key: stored.private_key.clone(),
            mode: stored.mode,
        })
    }
}
