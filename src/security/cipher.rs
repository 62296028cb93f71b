// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{SecurityError, SymKeyType};
use crate::RecordId;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use std::{collections::BTreeMap, fmt};

/// Length of every symmetric key, in bytes.
pub const KEY_LEN: usize = 32;
const AES_NONCE_LEN: usize = 12;
const XCHACHA_NONCE_LEN: usize = 24;

/// One ready-to-use symmetric cipher.
///
/// Ciphertext produced by [`SymmetricCipher::encrypt`] is the random nonce followed
/// by the AEAD output.
#[derive(Clone)]
pub enum SymmetricCipher {
    Aes256Gcm(Aes256Gcm),
    XChaCha20Poly1305(XChaCha20Poly1305),
}

impl SymmetricCipher {
    pub fn new(key_type: SymKeyType, key: &[u8]) -> Result<Self, SecurityError> {
        let invalid = |_| SecurityError::KeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        };
        match key_type {
            SymKeyType::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map(SymmetricCipher::Aes256Gcm)
                .map_err(invalid),
            SymKeyType::XChaCha20Poly1305 => XChaCha20Poly1305::new_from_slice(key)
                .map(SymmetricCipher::XChaCha20Poly1305)
                .map_err(invalid),
        }
    }

    pub fn key_type(&self) -> SymKeyType {
        match self {
            SymmetricCipher::Aes256Gcm(_) => SymKeyType::Aes256Gcm,
            SymmetricCipher::XChaCha20Poly1305(_) => SymKeyType::XChaCha20Poly1305,
        }
    }

    fn nonce_len(&self) -> usize {
        match self {
            SymmetricCipher::Aes256Gcm(_) => AES_NONCE_LEN,
            SymmetricCipher::XChaCha20Poly1305(_) => XCHACHA_NONCE_LEN,
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let (nonce, sealed) = match self {
            SymmetricCipher::Aes256Gcm(cipher) => {
                let nonce: [u8; AES_NONCE_LEN] = rand::random();
                let sealed = cipher.encrypt(Nonce::from_slice(&nonce), plaintext);
                (nonce.to_vec(), sealed)
            }
            SymmetricCipher::XChaCha20Poly1305(cipher) => {
                let nonce: [u8; XCHACHA_NONCE_LEN] = rand::random();
                let sealed = cipher.encrypt(XNonce::from_slice(&nonce), plaintext);
                (nonce.to_vec(), sealed)
            }
        };
        let sealed = sealed.map_err(|_| SecurityError::Encrypt)?;
        let mut out = nonce;
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecurityError> {
        if data.len() < self.nonce_len() {
            return Err(SecurityError::Malformed("ciphertext"));
        }
        let (nonce, sealed) = data.split_at(self.nonce_len());
        let opened = match self {
            SymmetricCipher::Aes256Gcm(cipher) => cipher.decrypt(Nonce::from_slice(nonce), sealed),
            SymmetricCipher::XChaCha20Poly1305(cipher) => {
                cipher.decrypt(XNonce::from_slice(nonce), sealed)
            }
        };
        opened.map_err(|_| SecurityError::Decrypt)
    }
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricCipher({})", self.key_type())
    }
}

/// The data key ciphers of one control key.
///
/// Every encryption picks one of the registered ciphers at random and records its
/// algorithm id in the first byte of the output, so decryption knows which cipher
/// to use.
#[derive(Clone)]
pub struct CipherSet {
    control_key: RecordId,
    ciphers: BTreeMap<SymKeyType, SymmetricCipher>,
}

impl CipherSet {
    pub fn new(control_key: RecordId) -> Self {
        Self {
            control_key,
            ciphers: BTreeMap::new(),
        }
    }

    /// Id of the control key these ciphers belong to.
    pub fn control_key(&self) -> RecordId {
        self.control_key
    }

    /// Adds a cipher, replacing any earlier one of the same algorithm.
    pub fn register(&mut self, cipher: SymmetricCipher) {
        self.ciphers.insert(cipher.key_type(), cipher);
    }

    pub fn contains(&self, key_type: SymKeyType) -> bool {
        self.ciphers.contains_key(&key_type)
    }

    pub fn key_types(&self) -> impl Iterator<Item = SymKeyType> + '_ {
        self.ciphers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.ciphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers.is_empty()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        if self.ciphers.is_empty() {
            return Err(SecurityError::NoCiphers);
        }
        let choice = rand::random_range(0..self.ciphers.len());
        let (key_type, cipher) = self
            .ciphers
            .iter()
            .nth(choice)
            .ok_or(SecurityError::NoCiphers)?;
        let tag = u8::try_from(key_type.to_id()).map_err(|_| SecurityError::Malformed("key type"))?;
        let body = cipher.encrypt(plaintext)?;
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(tag);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let (&tag, body) = data
            .split_first()
            .ok_or(SecurityError::Malformed("ciphertext"))?;
        let cipher = SymKeyType::from_id(i32::from(tag))
            .ok()
            .and_then(|key_type| self.ciphers.get(&key_type))
            .ok_or(SecurityError::UnknownCipher(tag))?;
        cipher.decrypt(body)
    }
}

impl fmt::Debug for CipherSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSet")
            .field("control_key", &self.control_key)
            .field("ciphers", &self.ciphers.keys().collect::<Vec<_>>())
            .finish()
    }
}
