// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::DataList;
use crate::{
    RecordId, Result,
    encrypted::EncryptedField,
    item::{Identifiable, Record},
    security::CipherSet,
    state::EditState,
    values::{FieldId, FieldValue, Value, ValueSet},
};
use tracing::trace;

/// An edit of one record of a [`DataList`].
///
/// Starting the edit pushes a history snapshot at the list's next version; all
/// changes go to that snapshot. [`ItemEdit::commit`] keeps it if anything actually
/// changed, and dropping the guard without committing undoes the edit.
///
/// # Example
///
/// ```rust,ignore
/// let mut tx = list.begin_edit(id)?;
/// tx.set(Payee::NAME, "Bank A");
/// if tx.commit() {
///     // the record changed
/// }
/// ```
#[must_use = "an edit is undone unless it is committed"]
pub struct ItemEdit<'a, R: Record> {
    list: &'a mut DataList<R>,
    position: usize,
    committed: bool,
}

impl<'a, R: Record> ItemEdit<'a, R> {
    pub(super) fn new(list: &'a mut DataList<R>, position: usize) -> Self {
        let version = list.version + 1;
        list.items[position].item_mut().push_history(version);
        Self {
            list,
            position,
            committed: false,
        }
    }

    pub fn id(&self) -> RecordId {
        self.record().id()
    }

    pub fn record(&self) -> &R {
        &self.list.items[self.position]
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.list.items[self.position]
    }

    /// The working snapshot.
    pub fn values(&self) -> &ValueSet {
        self.record().item().values()
    }

    fn values_mut(&mut self) -> &mut ValueSet {
        self.record_mut().item_mut().values_mut()
    }

    pub fn set(&mut self, field: FieldId, value: impl Into<Value>) {
        self.values_mut().set(field, value);
    }

    pub fn clear(&mut self, field: FieldId) {
        self.values_mut().set_field(field, None);
    }

    /// Sets an encrypted field, encrypting it under `cipher`.
    ///
    /// An unchanged value keeps its existing ciphertext.
    pub fn set_encrypted(
        &mut self,
        field: FieldId,
        value: impl Into<Value>,
        cipher: &CipherSet,
    ) -> Result<()> {
        let value = value.into();
        match self
            .values_mut()
            .get_mut(field)
            .and_then(FieldValue::as_encrypted_mut)
        {
            Some(existing) => existing.set_value_with(value, cipher),
            None => {
                let encrypted = EncryptedField::with_cipher(value, cipher)?;
                self.values_mut().set_encrypted(field, encrypted);
                Ok(())
            }
        }
    }

    pub fn delete(&mut self) {
        self.values_mut().set_deletion(true);
    }

    pub fn recover(&mut self) {
        self.values_mut().set_deletion(false);
    }

    /// Ends the edit, returning whether the record changed.
    ///
    /// On a change the record's state is recomputed, the list moves to the new
    /// version, and the list is re-sorted and re-validated.
    pub fn commit(mut self) -> bool {
        self.committed = true;
        let style = self.list.style;
        let item = self.list.items[self.position].item_mut();
        if !item.maybe_pop_history() {
            trace!(list = R::LIST_NAME, id = item.id(), "edit without changes");
            return false;
        }
        item.adjust_state(style);
        item.raise_edit_state(EditState::Dirty);
        self.list.version += 1;
        self.list.re_sort();
        self.list.validate();
        true
    }
}

impl<R: Record> Drop for ItemEdit<'_, R> {
    fn drop(&mut self) {
        if !self.committed {
            self.list.items[self.position].item_mut().pop_history();
        }
    }
}
