// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The key hierarchy as records.
//!
//! Key material is persisted like any other data, in three lists:
//!
//! - [`ControlKey`]: password hash, public key and sealed private key of one
//!   control key, plus its cipher mode.
//! - [`DataKey`]: one wrapped symmetric key, linked to its control key.
//! - [`ControlData`]: the single record saying which control key is active.
//!
//! The unlocked counterparts (a [`SecurityControl`] and a [`CipherSet`] per control
//! key) live in a [`KeyRing`] next to the lists.
use crate::{
    Error, IdMap, RecordId, Result, create_id_map,
    item::{DataItem, Record, required},
    security::{CipherMode, CipherSet, SecurityControl, StoredControl, SymKeyType, SymmetricCipher},
    values::{FieldDef, Value, ValueSet},
};
use std::collections::BTreeMap;

fn bytes(value: &Value) -> Option<Vec<u8>> {
    value.as_bytes().map(<[u8]>::to_vec)
}

fn static_id(value: &Value) -> Option<i32> {
    value.as_integer().and_then(|id| i32::try_from(id).ok())
}

/// A control key record.
#[derive(Clone, Debug)]
pub struct ControlKey {
    item: DataItem,
    data_keys: BTreeMap<SymKeyType, RecordId>,
}

impl ControlKey {
    pub const PASSWORD_HASH: usize = 0;
    pub const PUBLIC_KEY: usize = 1;
    pub const PRIVATE_KEY: usize = 2;
    pub const CIPHER_MODE: usize = 3;

    pub(crate) fn values(
        password_hash: Vec<u8>,
        public_key: Vec<u8>,
        private_key: Vec<u8>,
        mode: CipherMode,
    ) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::PASSWORD_HASH, password_hash);
        values.set(Self::PUBLIC_KEY, public_key);
        values.set(Self::PRIVATE_KEY, private_key);
        values.set(Self::CIPHER_MODE, mode.to_id());
        values
    }

    pub(crate) fn values_for(control: &SecurityControl) -> ValueSet {
        let stored = control.stored();
        Self::values(
            stored.password_hash,
            stored.public_key,
            stored.private_key,
            stored.mode,
        )
    }

    pub fn mode(&self) -> Result<CipherMode> {
        let id = required(self, Self::CIPHER_MODE, "an integer", static_id)?;
        CipherMode::from_id(id)
    }

    /// The persisted key material, as handed to
    /// [`SecurityProvider::resolve_control`](crate::SecurityProvider::resolve_control).
    pub fn stored(&self) -> Result<StoredControl> {
        Ok(StoredControl {
            password_hash: required(self, Self::PASSWORD_HASH, "bytes", bytes)?,
            public_key: required(self, Self::PUBLIC_KEY, "bytes", bytes)?,
            private_key: required(self, Self::PRIVATE_KEY, "bytes", bytes)?,
            mode: self.mode()?,
        })
    }

    /// Id of this key's data key for `key_type`.
    pub fn data_key(&self, key_type: SymKeyType) -> Option<RecordId> {
        self.data_keys.get(&key_type).copied()
    }

    pub(crate) fn register_data_key(&mut self, key_type: SymKeyType, id: RecordId) {
        self.data_keys.insert(key_type, id);
    }
}

impl Record for ControlKey {
    const LIST_NAME: &'static str = "ControlKeys";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::plain("PasswordHash"),
        FieldDef::plain("PublicKey"),
        FieldDef::plain("PrivateKey"),
        FieldDef::plain("CipherMode"),
    ];

    fn item(&self) -> &DataItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut DataItem {
        &mut self.item
    }

    fn from_item(item: DataItem) -> Self {
        Self {
            item,
            data_keys: BTreeMap::new(),
        }
    }
}

/// A data key record.
#[derive(Clone, Debug)]
pub struct DataKey {
    item: DataItem,
    cipher: Option<SymmetricCipher>,
}

impl DataKey {
    pub const CONTROL_KEY: usize = 0;
    pub const KEY_TYPE: usize = 1;
    pub const SECURED_KEY: usize = 2;

    pub(crate) fn values(control_key: RecordId, key_type: SymKeyType, secured: Vec<u8>) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::CONTROL_KEY, Value::Link(control_key));
        values.set(Self::KEY_TYPE, key_type.to_id());
        values.set(Self::SECURED_KEY, secured);
        values
    }

    pub fn control_key(&self) -> Result<RecordId> {
        required(self, Self::CONTROL_KEY, "a link", Value::as_link)
    }

    pub fn key_type(&self) -> Result<SymKeyType> {
        let id = required(self, Self::KEY_TYPE, "an integer", static_id)?;
        SymKeyType::from_id(id)
    }

    /// The wrapped and signed key bytes.
    pub fn secured_key(&self) -> Result<&[u8]> {
        required(self, Self::SECURED_KEY, "bytes", Value::as_bytes)
    }

    /// The unwrapped cipher, once the owning control key is unlocked.
    pub fn cipher(&self) -> Option<&SymmetricCipher> {
        self.cipher.as_ref()
    }

    pub(crate) fn set_cipher(&mut self, cipher: SymmetricCipher) {
        self.cipher = Some(cipher);
    }
}

impl Record for DataKey {
    const LIST_NAME: &'static str = "DataKeys";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::plain("ControlKey"),
        FieldDef::plain("KeyType"),
        FieldDef::plain("SecuredKey"),
    ];

    fn item(&self) -> &DataItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut DataItem {
        &mut self.item
    }

    fn from_item(item: DataItem) -> Self {
        Self { item, cipher: None }
    }
}

/// The singleton record pointing at the active control key.
#[derive(Clone, Debug)]
pub struct ControlData {
    item: DataItem,
}

impl ControlData {
    pub const DATA_VERSION: usize = 0;
    pub const CONTROL_KEY: usize = 1;

    pub(crate) fn values(data_version: i64, control_key: RecordId) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::DATA_VERSION, data_version);
        values.set(Self::CONTROL_KEY, Value::Link(control_key));
        values
    }

    pub fn data_version(&self) -> Result<i64> {
        required(self, Self::DATA_VERSION, "an integer", Value::as_integer)
    }

    pub fn control_key(&self) -> Result<RecordId> {
        required(self, Self::CONTROL_KEY, "a link", Value::as_link)
    }
}

impl Record for ControlData {
    const LIST_NAME: &'static str = "ControlData";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::plain("DataVersion"),
        FieldDef::plain("ControlKey"),
    ];

    fn item(&self) -> &DataItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut DataItem {
        &mut self.item
    }

    fn from_item(item: DataItem) -> Self {
        Self { item }
    }
}

/// Unlocked key material, by control key id.
#[derive(Clone, Debug)]
pub struct KeyRing {
    controls: IdMap<SecurityControl>,
    ciphers: IdMap<CipherSet>,
}

impl Default for KeyRing {
    fn default() -> Self {
        Self {
            controls: create_id_map(2),
            ciphers: create_id_map(2),
        }
    }
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn contains(&self, control_key: RecordId) -> bool {
        self.controls.contains_key(&control_key)
    }

    pub fn control(&self, control_key: RecordId) -> Result<&SecurityControl> {
        self.controls
            .get(&control_key)
            .ok_or(Error::UnknownControlKey { id: control_key })
    }

    pub fn cipher_set(&self, control_key: RecordId) -> Result<&CipherSet> {
        self.ciphers
            .get(&control_key)
            .ok_or(Error::UnknownControlKey { id: control_key })
    }

    pub fn insert(&mut self, control: SecurityControl, ciphers: CipherSet) {
        let id = ciphers.control_key();
        self.controls.insert(id, control);
        self.ciphers.insert(id, ciphers);
    }

    pub fn remove(&mut self, control_key: RecordId) -> bool {
        self.ciphers.remove(&control_key);
        self.controls.remove(&control_key).is_some()
    }

    /// Drops the material of every control key `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
        self.controls.retain(|&id, _| keep(id));
        let controls = &self.controls;
        self.ciphers.retain(|id, _| controls.contains_key(id));
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.controls.keys().copied()
    }
}
