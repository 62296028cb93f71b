// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Field values stored encrypted.
//!
//! An [`EncryptedField`] keeps the plaintext in memory for reading and comparing,
//! and its ciphertext for persisting. The ciphertext is bound to one control key
//! (by id): it is produced by that key's [`CipherSet`] and can only be decrypted by
//! it.
//!
//! Once a field is bound to a key its ciphertext always decrypts to its plaintext.
//! Changing the plaintext without a cipher at hand drops the ciphertext until
//! [`EncryptedField::encrypt_value`] runs again.
use crate::{
    RecordId, Result,
    security::{CipherSet, SecurityError},
    values::{Decimal, Difference, Value},
};
use chrono::NaiveDate;
use std::{fmt, sync::Arc};

/// A value that can be turned into plaintext bytes and back.
pub trait Encryptable: Clone + PartialEq + fmt::Debug {
    fn to_plain_bytes(&self) -> Vec<u8>;

    /// # Errors
    ///
    /// Fails if `bytes` is not an encoding produced by [`Encryptable::to_plain_bytes`].
    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError>;
}

fn decode_error(kind: &'static str, bytes: &[u8]) -> SecurityError {
    SecurityError::Decode {
        kind,
        len: bytes.len(),
    }
}

impl Encryptable for String {
    fn to_plain_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| decode_error("text", bytes))
    }
}

impl Encryptable for i64 {
    fn to_plain_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        bytes
            .try_into()
            .map(i64::from_be_bytes)
            .map_err(|_| decode_error("integer", bytes))
    }
}

impl Encryptable for bool {
    fn to_plain_bytes(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(decode_error("bool", bytes)),
        }
    }
}

impl Encryptable for Decimal {
    fn to_plain_bytes(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        Decimal::from_bytes(bytes).ok_or_else(|| decode_error("decimal", bytes))
    }
}

impl Encryptable for NaiveDate {
    fn to_plain_bytes(&self) -> Vec<u8> {
        use chrono::Datelike;
        self.num_days_from_ce().to_be_bytes().to_vec()
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        bytes
            .try_into()
            .ok()
            .map(i32::from_be_bytes)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or_else(|| decode_error("date", bytes))
    }
}

impl Encryptable for Vec<u8> {
    fn to_plain_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        Ok(bytes.to_vec())
    }
}

// one tag byte, then the payload of the inner type
impl Encryptable for Value {
    fn to_plain_bytes(&self) -> Vec<u8> {
        let (tag, payload) = match self {
            Value::Bool(v) => (0, v.to_plain_bytes()),
            Value::Integer(v) => (1, v.to_plain_bytes()),
            Value::Text(v) => (2, v.to_plain_bytes()),
            Value::Date(v) => (3, v.to_plain_bytes()),
            Value::Decimal(v) => (4, v.to_plain_bytes()),
            Value::Bytes(v) => (5, v.clone()),
            Value::Link(v) => (6, v.to_be_bytes().to_vec()),
        };
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(tag);
        out.extend_from_slice(&payload);
        out
    }

    fn from_plain_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| decode_error("value", bytes))?;
        Ok(match tag {
            0 => Value::Bool(bool::from_plain_bytes(payload)?),
            1 => Value::Integer(i64::from_plain_bytes(payload)?),
            2 => Value::Text(String::from_plain_bytes(payload)?),
            3 => Value::Date(NaiveDate::from_plain_bytes(payload)?),
            4 => Value::Decimal(Decimal::from_plain_bytes(payload)?),
            5 => Value::Bytes(payload.to_vec()),
            6 => Value::Link(
                payload
                    .try_into()
                    .map(u32::from_be_bytes)
                    .map_err(|_| decode_error("link", payload))?,
            ),
            _ => return Err(decode_error("value", bytes)),
        })
    }
}

/// A plaintext value paired with its ciphertext under one control key.
///
/// The ciphertext is reference counted so that [`EncryptedField::adopt_encryption`]
/// can share the exact bytes of a prior copy instead of producing new ones.
#[derive(Clone)]
pub struct EncryptedField<T> {
    value: T,
    encrypted: Option<Arc<[u8]>>,
    control_key: Option<RecordId>,
}

impl<T: Encryptable> EncryptedField<T> {
    /// Wraps a value that is not bound to any key yet.
    pub fn new(value: T) -> Self {
        Self {
            value,
            encrypted: None,
            control_key: None,
        }
    }

    /// Wraps `value` and encrypts it immediately.
    pub fn with_cipher(value: T, cipher: &CipherSet) -> Result<Self> {
        let mut field = Self::new(value);
        field.encrypt_value(cipher)?;
        Ok(field)
    }

    /// Rebuilds a field from stored ciphertext.
    ///
    /// # Errors
    ///
    /// Fails if the ciphertext does not decrypt under `cipher`, or if the plaintext
    /// is not a valid encoding of `T`.
    pub fn from_ciphertext(cipher: &CipherSet, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        let plain = cipher.decrypt(&bytes)?;
        let value = T::from_plain_bytes(&plain)?;
        Ok(Self {
            value,
            encrypted: Some(bytes),
            control_key: Some(cipher.control_key()),
        })
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn ciphertext(&self) -> Option<&Arc<[u8]>> {
        self.encrypted.as_ref()
    }

    /// The control key the ciphertext was produced under.
    pub fn control_key(&self) -> Option<RecordId> {
        self.control_key
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted.is_some()
    }

    /// Whether the ciphertext is present and produced by `cipher`.
    pub fn is_encrypted_by(&self, cipher: &CipherSet) -> bool {
        self.encrypted.is_some() && self.control_key == Some(cipher.control_key())
    }

    /// Replaces the plaintext. An unchanged value keeps its ciphertext.
    pub fn set_value(&mut self, value: T) {
        if value != self.value {
            self.value = value;
            self.encrypted = None;
        }
    }

    /// Replaces the plaintext and makes sure the ciphertext matches it.
    pub fn set_value_with(&mut self, value: T, cipher: &CipherSet) -> Result<()> {
        self.set_value(value);
        self.encrypt_value(cipher)
    }

    /// Encrypts the plaintext under `cipher` unless that has already happened.
    pub fn encrypt_value(&mut self, cipher: &CipherSet) -> Result<()> {
        if self.is_encrypted_by(cipher) {
            return Ok(());
        }
        self.reencrypt(cipher)
    }

    fn reencrypt(&mut self, cipher: &CipherSet) -> Result<()> {
        let bytes = cipher.encrypt(&self.value.to_plain_bytes())?;
        self.encrypted = Some(bytes.into());
        self.control_key = Some(cipher.control_key());
        Ok(())
    }

    /// Takes over the ciphertext of `prior` if it still fits.
    ///
    /// When the plaintext equals `prior`'s and `prior` was encrypted under `cipher`,
    /// the very same ciphertext bytes are shared. Otherwise the plaintext is
    /// encrypted afresh under `cipher`.
    pub fn adopt_encryption(&mut self, cipher: &CipherSet, prior: &EncryptedField<T>) -> Result<()> {
        if self.value == prior.value && prior.is_encrypted_by(cipher) {
            self.encrypted.clone_from(&prior.encrypted);
            self.control_key = prior.control_key;
            return Ok(());
        }
        self.reencrypt(cipher)
    }

    /// Compares two fields by plaintext first and stored bytes second.
    pub fn differs(&self, other: &EncryptedField<T>) -> Difference {
        if self.value != other.value {
            return Difference::Different;
        }
        let same_bytes = match (&self.encrypted, &other.encrypted) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a[..] == b[..],
            _ => false,
        };
        if same_bytes && self.control_key == other.control_key {
            Difference::Identical
        } else {
            Difference::SecurityDifferent
        }
    }
}

impl<T: Encryptable> PartialEq for EncryptedField<T> {
    fn eq(&self, other: &Self) -> bool {
        self.differs(other).is_identical()
    }
}

impl<T: fmt::Debug> fmt::Debug for EncryptedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EncryptedField");
        s.field("value", &self.value);
        match (&self.encrypted, self.control_key) {
            (Some(bytes), Some(key)) => s.field("key", &key).field("len", &bytes.len()),
            (None, Some(key)) => s.field("key", &key).field("len", &"stale"),
            _ => s.field("key", &"unbound"),
        };
        s.finish()
    }
}
