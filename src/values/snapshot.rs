// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Difference, FieldId, FieldValue, Value, slot_differs};
use crate::encrypted::EncryptedField;
use smallvec::SmallVec;
use std::fmt;

/// One snapshot of a record's fields.
///
/// Besides the field slots a snapshot carries the list version at which it was
/// created and a deletion flag. Snapshots on a record's history stack are never
/// modified; only the working snapshot on top is.
#[derive(Clone)]
pub struct ValueSet {
    version: u32,
    deleted: bool,
    fields: SmallVec<[Option<FieldValue>; 6]>,
}

impl ValueSet {
    /// Creates a snapshot with `field_count` unset fields at version 0.
    pub fn new(field_count: usize) -> Self {
        Self {
            version: 0,
            deleted: false,
            fields: smallvec::smallvec![None; field_count],
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    pub fn is_deletion(&self) -> bool {
        self.deleted
    }

    pub fn set_deletion(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Number of field slots.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: FieldId) -> Option<&FieldValue> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, field: FieldId) -> Option<&mut FieldValue> {
        self.fields.get_mut(field).and_then(Option::as_mut)
    }

    /// The plaintext value of `field`, if set.
    pub fn value(&self, field: FieldId) -> Option<&Value> {
        self.get(field).map(FieldValue::value)
    }

    /// Stores a plain value in `field`.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a slot of this snapshot.
    pub fn set(&mut self, field: FieldId, value: impl Into<Value>) {
        self.fields[field] = Some(FieldValue::Plain(value.into()));
    }

    /// Stores an encrypted value in `field`.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a slot of this snapshot.
    pub fn set_encrypted(&mut self, field: FieldId, value: EncryptedField<Value>) {
        self.fields[field] = Some(FieldValue::Encrypted(value));
    }

    /// Replaces the slot of `field` wholesale.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a slot of this snapshot.
    pub fn set_field(&mut self, field: FieldId, value: Option<FieldValue>) {
        self.fields[field] = value;
    }

    /// Iterates over all slots in field order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, Option<&FieldValue>)> {
        self.fields.iter().map(Option::as_ref).enumerate()
    }

    pub fn encrypted_fields(&self) -> impl Iterator<Item = (FieldId, &EncryptedField<Value>)> {
        self.fields.iter().enumerate().filter_map(|(field, slot)| {
            slot.as_ref()
                .and_then(FieldValue::as_encrypted)
                .map(|enc| (field, enc))
        })
    }

    pub fn encrypted_fields_mut(
        &mut self,
    ) -> impl Iterator<Item = (FieldId, &mut EncryptedField<Value>)> {
        self.fields.iter_mut().enumerate().filter_map(|(field, slot)| {
            slot.as_mut()
                .and_then(FieldValue::as_encrypted_mut)
                .map(|enc| (field, enc))
        })
    }

    /// Copies every field slot of `other` into `self`, leaving version and
    /// deletion flag alone.
    pub fn copy_fields_from(&mut self, other: &ValueSet) {
        self.fields.clone_from(&other.fields);
    }

    /// Compares the field slots only; the deletion flag and version are ignored.
    pub fn fields_differ(&self, other: &ValueSet) -> Difference {
        if self.fields.len() != other.fields.len() {
            return Difference::Different;
        }
        self.fields
            .iter()
            .zip(&other.fields)
            .map(|(a, b)| slot_differs(a.as_ref(), b.as_ref()))
            .fold(Difference::Identical, Difference::combine)
    }

    /// Compares fields and deletion flag; the version is ignored.
    pub fn differs(&self, other: &ValueSet) -> Difference {
        if self.deleted != other.deleted {
            return Difference::Different;
        }
        self.fields_differ(other)
    }

    pub fn field_differs(&self, other: &ValueSet, field: FieldId) -> Difference {
        slot_differs(self.get(field), other.get(field))
    }

    /// Ids of the fields whose values differ from `other`.
    pub fn changed_fields(&self, other: &ValueSet) -> SmallVec<[FieldId; 8]> {
        (0..self.fields.len().max(other.fields.len()))
            .filter(|&field| !self.field_differs(other, field).is_identical())
            .collect()
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} ", self.version)?;
        let mut list = f.debug_list();
        for slot in &self.fields {
            match slot {
                Some(value) => list.entry(value.value()),
                None => list.entry(&format_args!("-")),
            };
        }
        list.finish()?;
        if self.deleted {
            f.write_str(" deleted")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decimal;

    fn payee(name: &str) -> ValueSet {
        let mut values = ValueSet::new(3);
        values.set(0, name);
        values.set(1, Decimal::new(1050, 2).unwrap());
        values
    }

    #[test]
    fn new_snapshot_is_unset() {
        let values = ValueSet::new(2);
        assert_eq!(values.len(), 2);
        assert_eq!(values.version(), 0);
        assert!(!values.is_deletion());
        assert!(values.get(0).is_none());
        assert!(values.get(7).is_none());
    }

    #[test]
    fn differs_ignores_version() {
        let a = payee("Bank");
        let mut b = a.clone();
        b.set_version(4);
        assert_eq!(a.differs(&b), Difference::Identical);

        b.set_deletion(true);
        assert_eq!(a.differs(&b), Difference::Different);
        assert_eq!(a.fields_differ(&b), Difference::Identical);
    }

    #[test]
    fn changed_fields() {
        let a = payee("Bank");
        let mut b = payee("Bank A");
        b.set(2, true);
        assert_eq!(a.changed_fields(&b).as_slice(), &[0, 2]);
        assert_eq!(a.field_differs(&b, 1), Difference::Identical);
    }

    #[test]
    fn debug_rendering() {
        let mut values = payee("Bank");
        values.set_version(2);
        values.set_deletion(true);
        insta::assert_snapshot!(format!("{values:?}"), @r#"v2 ["Bank", 10.50, -] deleted"#);
    }
}
