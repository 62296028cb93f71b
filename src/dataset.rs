// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! A full dataset: user lists plus the key hierarchy that secures them.
//!
//! The crate does not know the application's record types. They are grouped in a
//! user-defined struct implementing [`UserLists`], which forwards each set-wide
//! operation to its lists. [`DataSet`] adds the key lists and the unlocked key
//! material, and runs the operations that involve both, most notably re-keying.
//!
//! # Re-keying
//!
//! [`DataSet::renew_security`] runs in three stages:
//!
//! 1. a clone of the active control key (same password, fresh key material) is
//!    installed and made active;
//! 2. every encrypted field of every user list is re-encrypted under it, in
//!    history, so that the step shows up as a pending change;
//! 3. all other control keys and their data keys are marked deleted.
//!
//! Until stage 3 completes the old keys stay intact, so a failure or cancellation
//! leaves a dataset that can still be decrypted and saved. Every stage writes at
//! the same version of the lists it touches, so one
//! [`DataSet::roll_back_changes`] undoes a renewal however far it got.
use crate::{
    Error, RecordId, Result,
    item::Record,
    keys::{ControlData, ControlKey, DataKey, KeyRing},
    list::DataList,
    security::{CipherMode, CipherSet, SecurityControl, SecurityProvider, SymKeyType},
    state::ListStyle,
    task::TaskControl,
};
use tracing::{debug, info, warn};

/// The application's own lists of a [`DataSet`].
///
/// Implementations forward each call to every list they hold, typically through
/// the [`DataList`] method of the same name.
pub trait UserLists: Sized {
    /// Derives every list into `style`; see [`DataList::derive_list`].
    fn derive_lists(&self, style: ListStyle) -> Result<Self>;

    /// See [`DataList::derive_differences`].
    fn difference_lists(&self, old: &Self) -> Self;

    /// See [`DataList::re_base`]. Returns the number of differing records.
    fn re_base(&mut self, base: &Self) -> usize;

    /// See [`DataList::update_security`]. Lists without encrypted fields may be
    /// skipped.
    fn update_security(&mut self, cipher: &CipherSet, task: &mut dyn TaskControl) -> Result<bool>;

    /// See [`DataList::adopt_security`].
    fn adopt_security(
        &mut self,
        cipher: &CipherSet,
        base: &Self,
        task: &mut dyn TaskControl,
    ) -> Result<bool>;

    fn commit_changes(&mut self) -> usize;

    fn roll_back_changes(&mut self) -> bool;
}

#[derive(Clone, Debug)]
pub struct DataSet<U> {
    generation: u32,
    control_keys: DataList<ControlKey>,
    data_keys: DataList<DataKey>,
    control_data: DataList<ControlData>,
    key_ring: KeyRing,
    lists: U,
}

pub const STAGE_RENEW: &str = "Renewing security";
pub const STAGE_UPDATE: &str = "Updating security";
pub const STAGE_PURGE: &str = "Purging old keys";

impl<U: UserLists> DataSet<U> {
    pub fn new(lists: U) -> Self {
        Self {
            generation: 0,
            control_keys: DataList::new(ListStyle::Core),
            data_keys: DataList::new(ListStyle::Core),
            control_data: DataList::new(ListStyle::Core),
            key_ring: KeyRing::new(),
            lists,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn lists(&self) -> &U {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> &mut U {
        &mut self.lists
    }

    pub fn control_keys(&self) -> &DataList<ControlKey> {
        &self.control_keys
    }

    pub fn data_keys(&self) -> &DataList<DataKey> {
        &self.data_keys
    }

    pub fn control_data(&self) -> &DataList<ControlData> {
        &self.control_data
    }

    pub fn key_ring(&self) -> &KeyRing {
        &self.key_ring
    }

    fn control_record(&self) -> Option<&ControlData> {
        self.control_data
            .iter()
            .find(|record| !record.item().is_deleted())
    }

    /// Id of the control key new encryptions use.
    pub fn active_control_key(&self) -> Option<RecordId> {
        self.control_record()
            .and_then(|record| record.control_key().ok())
    }

    /// The ciphers of the active control key.
    ///
    /// # Errors
    ///
    /// Fails if no control key is active or its keys have not been unlocked.
    pub fn cipher_set(&self) -> Result<&CipherSet> {
        let active = self.active_control_key().ok_or(Error::NoControlKey)?;
        self.key_ring.cipher_set(active)
    }

    /// The ciphers of any unlocked control key, for decrypting loaded values.
    pub fn cipher_set_for(&self, control_key: RecordId) -> Result<&CipherSet> {
        self.key_ring.cipher_set(control_key)
    }

    /// Sets up encryption for a dataset that has none yet, encrypting every
    /// encrypted field of the user lists.
    pub fn initialise_security(
        &mut self,
        provider: &dyn SecurityProvider,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        if self.active_control_key().is_some() {
            return Err(Error::SecurityInitialised);
        }
        let id = self.install_control(provider.new_control()?)?;
        self.set_active_control(id)?;
        info!(control_key = id, "initialised security");
        self.update_security(task)
    }

    /// Adds a control key with freshly generated data keys for its mode.
    ///
    /// The records are added as NEW; nothing is added if key generation fails.
    pub fn install_control(&mut self, control: SecurityControl) -> Result<RecordId> {
        let keys = control
            .mode()
            .key_types()
            .iter()
            .map(|&key_type| control.new_symmetric_key(key_type).map(|key| (key_type, key)))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.control_keys.add_new(ControlKey::values_for(&control));
        let mut ciphers = CipherSet::new(id);
        let version = self.data_keys.version() + 1;
        for (key_type, (cipher, secured)) in keys {
            let key_id = self
                .data_keys
                .add_new_at(DataKey::values(id, key_type, secured), version);
            if let Some(data_key) = self.data_keys.get_mut(key_id) {
                data_key.set_cipher(cipher.clone());
            }
            if let Some(control_key) = self.control_keys.get_mut(id) {
                control_key.register_data_key(key_type, key_id);
            }
            ciphers.register(cipher);
        }
        self.key_ring.insert(control, ciphers);
        debug!(control_key = id, "installed control key");
        Ok(id)
    }

    /// Points the control data record at `control_key`.
    pub fn set_active_control(&mut self, control_key: RecordId) -> Result<()> {
        if !self.key_ring.contains(control_key) {
            return Err(Error::UnknownControlKey { id: control_key });
        }
        let existing = self.control_record().map(|record| record.item().id());
        match existing {
            None => {
                self.control_data
                    .add_new(ControlData::values(0, control_key));
            }
            Some(id) => {
                let mut edit = self.control_data.begin_edit(id)?;
                edit.set(ControlData::CONTROL_KEY, crate::Value::Link(control_key));
                edit.commit();
            }
        }
        Ok(())
    }

    /// Re-keys the dataset; see the module documentation.
    ///
    /// Returns `Ok(false)` if `task` cancelled. The old keys are only purged in
    /// the last stage, so an early stop leaves them usable.
    pub fn renew_security(
        &mut self,
        provider: &dyn SecurityProvider,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        if !task.set_num_stages(3) || !task.set_new_stage(STAGE_RENEW) {
            return Ok(false);
        }
        let active = self.active_control_key().ok_or(Error::NoControlKey)?;
        let renewed = provider.clone_control(self.key_ring.control(active)?)?;
        let id = self.install_control(renewed)?;
        // the purge joins the version the new keys were added at
        let versions = (self.control_keys.version(), self.data_keys.version());
        self.set_active_control(id)?;
        info!(from = active, to = id, "renewing security");

        if !task.set_new_stage(STAGE_UPDATE) || !self.update_security(task)? {
            warn!(control_key = id, "security renewal stopped before purge");
            return Ok(false);
        }
        if !task.set_new_stage(STAGE_PURGE) {
            warn!(control_key = id, "security renewal stopped before purge");
            return Ok(false);
        }
        self.purge_at(versions)?;
        Ok(true)
    }

    /// Encrypts every encrypted field of the user lists under the active keys.
    pub fn update_security(&mut self, task: &mut dyn TaskControl) -> Result<bool> {
        let active = self.active_control_key().ok_or(Error::NoControlKey)?;
        let ciphers = self.key_ring.cipher_set(active)?;
        self.lists.update_security(ciphers, task)
    }

    /// Marks every control key but the active one, and their data keys, deleted.
    ///
    /// Control keys that are still referenced are kept. All deletions share one
    /// version per key list, so a single rollback restores them together. Returns
    /// the number of control keys purged.
    pub fn purge_old_control_keys(&mut self) -> Result<usize> {
        let versions = (self.control_keys.version() + 1, self.data_keys.version() + 1);
        self.purge_at(versions)
    }

    fn purge_at(&mut self, (control_version, data_version): (u32, u32)) -> Result<usize> {
        let active = self.active_control_key().ok_or(Error::NoControlKey)?;
        self.control_keys.clear_touches();
        self.control_keys.touch(active)?;

        let stale: Vec<RecordId> = self
            .control_keys
            .iter()
            .map(Record::item)
            .filter(|item| !item.is_deleted() && !item.is_active())
            .map(|item| item.id())
            .collect();
        let data_keys: Vec<RecordId> = self
            .data_keys
            .iter()
            .filter(|key| !key.item().is_deleted())
            .filter(|key| key.control_key().is_ok_and(|owner| stale.contains(&owner)))
            .map(|key| key.item().id())
            .collect();
        self.data_keys.delete_items_at(&data_keys, data_version)?;
        self.control_keys.delete_items_at(&stale, control_version)?;
        info!(purged = stale.len(), active, "purged old control keys");
        Ok(stale.len())
    }

    /// Encrypts the user lists under the active keys of `base`, taking over
    /// `base`'s ciphertext where the plaintext is unchanged. The key hierarchy of
    /// `base` replaces this dataset's.
    pub fn adopt_security(&mut self, base: &DataSet<U>, task: &mut dyn TaskControl) -> Result<bool> {
        let ciphers = base.cipher_set()?;
        if !self.lists.adopt_security(ciphers, &base.lists, task)? {
            return Ok(false);
        }
        self.control_keys = base.control_keys.clone();
        self.data_keys = base.data_keys.clone();
        self.control_data = base.control_data.clone();
        self.key_ring = base.key_ring.clone();
        Ok(true)
    }

    /// Loads a control key record.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate id or an unknown cipher mode id.
    pub fn add_control_key(
        &mut self,
        id: RecordId,
        password_hash: Vec<u8>,
        public_key: Vec<u8>,
        private_key: Vec<u8>,
        mode_id: i32,
    ) -> Result<RecordId> {
        let mode = CipherMode::from_id(mode_id)?;
        self.control_keys.add_loaded(
            id,
            ControlKey::values(password_hash, public_key, private_key, mode),
        )
    }

    /// Loads a data key record and registers it with its control key.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate id, an unknown key type id, or a control key that has
    /// not been loaded.
    pub fn add_data_key(
        &mut self,
        id: RecordId,
        control_key: RecordId,
        key_type_id: i32,
        secured: Vec<u8>,
    ) -> Result<RecordId> {
        let key_type = SymKeyType::from_id(key_type_id)?;
        if !self.control_keys.contains(control_key) {
            return Err(Error::UnresolvedLink {
                list: DataKey::LIST_NAME,
                id,
                target: ControlKey::LIST_NAME,
                target_id: control_key,
            });
        }
        let id = self
            .data_keys
            .add_loaded(id, DataKey::values(control_key, key_type, secured))?;
        if let Some(owner) = self.control_keys.get_mut(control_key) {
            owner.register_data_key(key_type, id);
        }
        Ok(id)
    }

    /// Loads the control data record.
    ///
    /// # Errors
    ///
    /// Fails if there already is one, or if its control key has not been loaded.
    pub fn add_control_data(
        &mut self,
        id: RecordId,
        data_version: i64,
        control_key: RecordId,
    ) -> Result<RecordId> {
        if self.control_record().is_some() {
            return Err(Error::Singleton {
                list: ControlData::LIST_NAME,
            });
        }
        if !self.control_keys.contains(control_key) {
            return Err(Error::UnresolvedLink {
                list: ControlData::LIST_NAME,
                id,
                target: ControlKey::LIST_NAME,
                target_id: control_key,
            });
        }
        self.control_data
            .add_loaded(id, ControlData::values(data_version, control_key))
    }

    /// Unlocks every loaded control key with `provider` and rebuilds the cipher
    /// sets from their data keys.
    ///
    /// Nothing is unlocked unless every key is.
    pub fn resolve_security(&mut self, provider: &dyn SecurityProvider) -> Result<()> {
        let mut resolved = Vec::new();
        for record in self
            .control_keys
            .iter()
            .filter(|record| !record.item().is_deleted())
        {
            let id = record.item().id();
            let control = provider.resolve_control(&record.stored()?)?;
            let mut ciphers = CipherSet::new(id);
            let mut unwrapped = Vec::new();
            for &key_type in control.mode().key_types() {
                let key_id = record
                    .data_key(key_type)
                    .ok_or(Error::MissingDataKey {
                        control: id,
                        key_type,
                    })?;
                let data_key = self.data_keys.get(key_id).ok_or(Error::NotFound {
                    list: DataKey::LIST_NAME,
                    id: key_id,
                })?;
                let cipher = control.unwrap_symmetric_key(key_type, data_key.secured_key()?)?;
                ciphers.register(cipher.clone());
                unwrapped.push((key_id, cipher));
            }
            resolved.push((control, ciphers, unwrapped));
        }

        for (control, ciphers, unwrapped) in resolved {
            debug!(control_key = ciphers.control_key(), "resolved control key");
            for (key_id, cipher) in unwrapped {
                if let Some(data_key) = self.data_keys.get_mut(key_id) {
                    data_key.set_cipher(cipher);
                }
            }
            self.key_ring.insert(control, ciphers);
        }
        Ok(())
    }

    /// Derives every list of the set into `style`.
    pub fn derive_set(&self, style: ListStyle) -> Result<Self> {
        Ok(Self {
            generation: self.generation + 1,
            control_keys: self.control_keys.derive_list(style)?,
            data_keys: self.data_keys.derive_list(style)?,
            control_data: self.control_data.derive_list(style)?,
            key_ring: self.key_ring.clone(),
            lists: self.lists.derive_lists(style)?,
        })
    }

    /// The records a backing store has to write.
    pub fn derive_update_set(&self) -> Result<Self> {
        self.derive_set(ListStyle::Update)
    }

    /// What turns `old` into this set.
    pub fn difference_set(&self, old: &Self) -> Self {
        Self {
            generation: self.generation,
            control_keys: self.control_keys.derive_differences(&old.control_keys),
            data_keys: self.data_keys.derive_differences(&old.data_keys),
            control_data: self.control_data.derive_differences(&old.control_data),
            key_ring: self.key_ring.clone(),
            lists: self.lists.difference_lists(&old.lists),
        }
    }

    /// Re-expresses every list relative to `base`; see [`DataList::re_base`].
    pub fn re_base(&mut self, base: &Self) -> usize {
        self.control_keys.re_base(&base.control_keys)
            + self.data_keys.re_base(&base.data_keys)
            + self.control_data.re_base(&base.control_data)
            + self.lists.re_base(&base.lists)
    }

    /// Commits pending changes of every list and forgets purged keys.
    pub fn commit_changes(&mut self) -> usize {
        let committed = self.control_keys.commit_changes()
            + self.data_keys.commit_changes()
            + self.control_data.commit_changes()
            + self.lists.commit_changes();
        self.prune_key_ring();
        committed
    }

    /// Rolls back the latest pending changes of every list.
    pub fn roll_back_changes(&mut self) -> bool {
        // every list must roll back, so no short-circuiting
        let rolled = [
            self.control_keys.roll_back_changes(),
            self.data_keys.roll_back_changes(),
            self.control_data.roll_back_changes(),
            self.lists.roll_back_changes(),
        ];
        self.prune_key_ring();
        rolled.contains(&true)
    }

    fn prune_key_ring(&mut self) {
        let control_keys = &self.control_keys;
        self.key_ring.retain(|id| control_keys.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind,
        security::PasswordSecurity,
        task::{NullTask, RecordingTask},
        test_util::{Payee, Payees},
    };

    fn secured() -> (DataSet<Payees>, PasswordSecurity) {
        let provider = PasswordSecurity::new("pw");
        let mut set = DataSet::new(Payees::with_names(&["Bank", "Gym"]));
        assert!(set.initialise_security(&provider, &mut NullTask).unwrap());
        set.commit_changes();
        (set, provider)
    }

    #[test]
    fn initialise_creates_key_records() {
        let (set, provider) = secured();
        let active = set.active_control_key().unwrap();
        assert_eq!(set.control_keys().len(), 1);
        assert_eq!(set.data_keys().len(), 2);
        assert_eq!(set.cipher_set().unwrap().control_key(), active);
        assert!(!set.lists().payees.needs_security_update(set.cipher_set().unwrap()));

        let mut again = set.clone();
        let err = again
            .initialise_security(&provider, &mut NullTask)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Logic);
    }

    #[test]
    fn renew_switches_keys() {
        let (mut set, provider) = secured();
        let old = set.active_control_key().unwrap();
        let mut task = RecordingTask::new();
        assert!(set.renew_security(&provider, &mut task).unwrap());
        assert_eq!(task.stages(), [STAGE_RENEW, STAGE_UPDATE, STAGE_PURGE]);

        let new = set.active_control_key().unwrap();
        assert_ne!(old, new);
        assert!(set.control_keys().get(old).unwrap().item().is_deleted());
        assert!(
            set.data_keys()
                .iter()
                .filter(|key| key.control_key().unwrap() == old)
                .all(|key| key.item().is_deleted())
        );

        // control keys, data keys, control data, payees
        assert_eq!(set.commit_changes(), 2 + 4 + 1 + 2);
        assert_eq!(set.key_ring().ids().collect::<Vec<_>>(), [new]);
    }

    #[test]
    fn cancelled_renewal_keeps_old_keys() {
        let (mut set, provider) = secured();
        let old = set.active_control_key().unwrap();
        let mut task = RecordingTask::stopping_at_stage(STAGE_PURGE);
        assert!(!set.renew_security(&provider, &mut task).unwrap());
        assert!(!set.control_keys().get(old).unwrap().item().is_deleted());
        assert!(set.cipher_set_for(old).is_ok());

        assert!(set.roll_back_changes());
        assert_eq!(set.active_control_key(), Some(old));
        assert_eq!(set.key_ring().ids().collect::<Vec<_>>(), [old]);
        assert!(!set.lists().payees.needs_security_update(set.cipher_set().unwrap()));
    }

    #[test]
    fn finished_renewal_rolls_back_in_one_step() {
        let (mut set, provider) = secured();
        let old = set.active_control_key().unwrap();
        assert!(set.renew_security(&provider, &mut NullTask).unwrap());
        assert_eq!(set.control_keys().version(), set.data_keys().version());

        assert!(set.roll_back_changes());
        assert_eq!(set.active_control_key(), Some(old));
        assert_eq!(set.control_keys().ids().collect::<Vec<_>>(), [old]);
        assert!(set.data_keys().iter().all(|key| !key.item().is_deleted()));

        assert_eq!(set.commit_changes(), 0);
        let control = set.control_keys().get(old).unwrap();
        for &key_type in control.mode().unwrap().key_types() {
            let id = control.data_key(key_type).unwrap();
            let data_key = set.data_keys().get(id).unwrap();
            assert_eq!(data_key.control_key().unwrap(), old);
            assert_eq!(data_key.key_type().unwrap(), key_type);
        }
        assert_eq!(set.key_ring().ids().collect::<Vec<_>>(), [old]);
        assert!(!set.lists().payees.needs_security_update(set.cipher_set().unwrap()));
    }

    #[test]
    fn purged_keys_share_one_version() {
        let (mut set, provider) = secured();
        let active = set.active_control_key().unwrap();
        let spare = set.install_control(provider.new_control().unwrap()).unwrap();
        let versions = (set.control_keys().version(), set.data_keys().version());

        assert_eq!(set.purge_old_control_keys().unwrap(), 1);
        assert_eq!(set.control_keys().version(), versions.0 + 1);
        assert_eq!(set.data_keys().version(), versions.1 + 1);

        // one rollback undoes the purge, a second the install
        assert!(set.roll_back_changes());
        assert!(!set.control_keys().get(spare).unwrap().item().is_deleted());
        assert!(set.data_keys().iter().all(|key| !key.item().is_deleted()));
        assert!(set.roll_back_changes());
        assert_eq!(set.control_keys().ids().collect::<Vec<_>>(), [active]);
        assert_eq!(set.data_keys().len(), 2);
    }

    #[test]
    fn loaders_validate_links() {
        let mut set = DataSet::new(Payees::default());
        assert_eq!(
            set.add_control_key(1, vec![], vec![], vec![], 7)
                .unwrap_err()
                .kind(),
            ErrorKind::Data
        );
        set.add_control_key(1, vec![], vec![], vec![], CipherMode::Single.to_id())
            .unwrap();
        let err = set.add_data_key(1, 2, 1, vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "DataKeys 1 links to missing ControlKeys 2"
        );
        assert!(set.add_data_key(1, 1, 3, vec![]).is_err());
        set.add_data_key(1, 1, SymKeyType::Aes256Gcm.to_id(), vec![])
            .unwrap();
        assert_eq!(
            set.control_keys()
                .get(1)
                .unwrap()
                .data_key(SymKeyType::Aes256Gcm),
            Some(1)
        );
        set.add_control_data(1, 3, 1).unwrap();
        assert!(matches!(
            set.add_control_data(2, 3, 1),
            Err(Error::Singleton { .. })
        ));
        assert_eq!(set.active_control_key(), Some(1));
        // nothing is unlocked yet
        assert!(matches!(
            set.cipher_set(),
            Err(Error::UnknownControlKey { id: 1 })
        ));
    }

    #[test]
    fn derived_sets() {
        let (mut set, _) = secured();
        let mut edit = set.derive_set(ListStyle::Edit).unwrap();
        let mut tx = edit.lists_mut().payees.begin_edit(1).unwrap();
        tx.set(Payee::NAME, "Bank A");
        assert!(tx.commit());
        assert_eq!(edit.generation(), set.generation() + 1);

        set.lists_mut().payees.prepare_changes(&edit.lists().payees).unwrap();
        let update = set.derive_update_set().unwrap();
        assert_eq!(update.lists().payees.len(), 1);
        assert!(update.control_keys().is_empty());
    }
}
