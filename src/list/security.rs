// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::DataList;
use crate::{
    Result,
    item::{Identifiable, Record},
    security::CipherSet,
    state::EditState,
    task::TaskControl,
};
use tracing::{debug, warn};

impl<R: Record> DataList<R> {
    /// Whether records of this list carry encrypted fields.
    pub fn is_encrypted(&self) -> bool {
        R::has_encrypted_fields()
    }

    /// Whether any record still needs encrypting under `cipher`.
    pub fn needs_security_update(&self, cipher: &CipherSet) -> bool {
        self.is_encrypted()
            && self
                .items
                .iter()
                .any(|record| record.item().needs_security_update(cipher.control_key()))
    }

    /// Re-encrypts every encrypted field not yet encrypted under `cipher`.
    ///
    /// Each affected record gets a history step at a new list version, so the
    /// change can be rolled back and shows up as a pending change. Returns
    /// `Ok(false)` if `task` cancelled; records done up to then keep their new
    /// ciphertext.
    pub fn update_security(&mut self, cipher: &CipherSet, task: &mut dyn TaskControl) -> Result<bool> {
        if !self.is_encrypted() {
            return Ok(true);
        }
        let control_key = cipher.control_key();
        let pending: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, record)| record.item().needs_security_update(control_key))
            .map(|(position, _)| position)
            .collect();
        if !task.set_num_steps(pending.len()) {
            return Ok(false);
        }
        if pending.is_empty() {
            return Ok(true);
        }

        let version = self.version + 1;
        self.version = version;
        self.edit_state = self.edit_state.combine(EditState::Dirty);
        let style = self.style;
        for (done, position) in pending.into_iter().enumerate() {
            let item = self.items[position].item_mut();
            item.update_security(cipher, version)?;
            item.adjust_state(style);
            item.raise_edit_state(EditState::Dirty);
            if !task.set_steps_done(done + 1) {
                warn!(list = R::LIST_NAME, done = done + 1, "security update cancelled");
                return Ok(false);
            }
        }
        debug!(list = R::LIST_NAME, control_key, version, "updated security");
        Ok(true)
    }

    /// Encrypts this list under `cipher`, taking over ciphertext from the
    /// same-id records of `base` wherever the plaintext is unchanged.
    ///
    /// No history is pushed: this is meant for a freshly loaded list.
    pub fn adopt_security(
        &mut self,
        cipher: &CipherSet,
        base: &DataList<R>,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        if !self.is_encrypted() {
            return Ok(true);
        }
        if !task.set_num_steps(self.items.len()) {
            return Ok(false);
        }
        for (done, record) in self.items.iter_mut().enumerate() {
            let prior = base.get(record.id()).map(Record::item);
            record.item_mut().adopt_security(cipher, prior)?;
            if !task.set_steps_done(done + 1) {
                warn!(list = R::LIST_NAME, done = done + 1, "security adoption cancelled");
                return Ok(false);
            }
        }
        debug!(list = R::LIST_NAME, control_key = cipher.control_key(), "adopted security");
        Ok(true)
    }
}
