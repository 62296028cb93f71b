// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{
    DataItem, DataList, FieldDef, ListStyle, Record, RecordId, Result, UserLists,
    ValidationErrors, ValueSet,
    encrypted::EncryptedField,
    security::{CipherSet, KEY_LEN, SymKeyType, SymmetricCipher},
    task::TaskControl,
};
use std::cmp::Ordering;

/// A cipher set with random keys for both algorithms.
pub(crate) fn test_cipher(control_key: RecordId) -> CipherSet {
    let mut ciphers = CipherSet::new(control_key);
    for &key_type in SymKeyType::ALL {
        let key: [u8; KEY_LEN] = rand::random();
        ciphers.register(SymmetricCipher::new(key_type, &key).unwrap());
    }
    ciphers
}

#[derive(Clone, Debug)]
pub(crate) struct Payee {
    item: DataItem,
}

impl Payee {
    pub(crate) const NAME: usize = 0;
    pub(crate) const NOTES: usize = 1;

    pub(crate) fn values(name: &str) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::NAME, name);
        values
    }

    pub(crate) fn with_plain_notes(name: &str, notes: &str) -> ValueSet {
        let mut values = Self::values(name);
        values.set_encrypted(Self::NOTES, EncryptedField::new(notes.into()));
        values
    }

    pub(crate) fn with_notes(name: &str, notes: &str, cipher: &CipherSet) -> ValueSet {
        let mut values = Self::values(name);
        values.set_encrypted(
            Self::NOTES,
            EncryptedField::with_cipher(notes.into(), cipher).unwrap(),
        );
        values
    }

    pub(crate) fn name(&self) -> &str {
        self.item
            .value(Self::NAME)
            .and_then(|value| value.as_text())
            .unwrap_or_default()
    }
}

impl Record for Payee {
    const LIST_NAME: &'static str = "Payees";
    const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Name"), FieldDef::encrypted("Notes")];

    fn item(&self) -> &DataItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut DataItem {
        &mut self.item
    }

    fn from_item(item: DataItem) -> Self {
        Self { item }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }

    fn validate(&self, list: &DataList<Self>, errors: &mut ValidationErrors) {
        if self.name().is_empty() {
            errors.add(Self::NAME, "Name is required");
            return;
        }
        let clash = list.iter().any(|other| {
            other.item.id() != self.item.id()
                && !other.item.is_deleted()
                && other.name() == self.name()
        });
        if clash {
            errors.add(Self::NAME, "Name must be unique");
        }
    }
}

/// A one-list dataset.
#[derive(Clone, Debug)]
pub(crate) struct Payees {
    pub(crate) payees: DataList<Payee>,
}

impl Default for Payees {
    fn default() -> Self {
        Self {
            payees: DataList::new(ListStyle::Core),
        }
    }
}

impl Payees {
    pub(crate) fn with_names(names: &[&str]) -> Self {
        let mut lists = Self::default();
        for (id, name) in names.iter().enumerate() {
            lists
                .payees
                .add_loaded(id as RecordId + 1, Payee::with_plain_notes(name, "notes"))
                .unwrap();
        }
        lists
    }
}

impl UserLists for Payees {
    fn derive_lists(&self, style: ListStyle) -> Result<Self> {
        Ok(Self {
            payees: self.payees.derive_list(style)?,
        })
    }

    fn difference_lists(&self, old: &Self) -> Self {
        Self {
            payees: self.payees.derive_differences(&old.payees),
        }
    }

    fn re_base(&mut self, base: &Self) -> usize {
        self.payees.re_base(&base.payees)
    }

    fn update_security(&mut self, cipher: &CipherSet, task: &mut dyn TaskControl) -> Result<bool> {
        self.payees.update_security(cipher, task)
    }

    fn adopt_security(
        &mut self,
        cipher: &CipherSet,
        base: &Self,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        self.payees.adopt_security(cipher, &base.payees, task)
    }

    fn commit_changes(&mut self) -> usize {
        self.payees.commit_changes()
    }

    fn roll_back_changes(&mut self) -> bool {
        self.payees.roll_back_changes()
    }
}
