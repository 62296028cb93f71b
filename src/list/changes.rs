// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::DataList;
use crate::{
    Error, Result,
    item::{DataItem, Identifiable, Record},
    state::{DataState, EditState, ListStyle},
};
use tracing::{debug, info};

impl<R: Record> DataList<R> {
    /// Copies the pending changes of the EDIT list `edit` into this CORE list.
    ///
    /// All changes land in history at one new version, so that the step can be
    /// finalised with [`DataList::commit_changes`] or undone with
    /// [`DataList::roll_back_changes`]. Returns the number of records touched.
    ///
    /// | edit state       | effect on the core list                         |
    /// |------------------|-------------------------------------------------|
    /// | NEW              | inserted; a fresh id is allocated on a clash    |
    /// | CHANGED          | values copied over                              |
    /// | DELETED, DELCHG  | deletion flag set                               |
    /// | RECOVERED        | deletion flag cleared, marked as restoring      |
    /// | others           | nothing                                         |
    ///
    /// # Errors
    ///
    /// Fails without changing anything if the styles are wrong or a changed
    /// record has no counterpart here.
    pub fn prepare_changes(&mut self, edit: &DataList<R>) -> Result<usize> {
        if self.style != ListStyle::Core {
            return Err(Error::InvalidStyle {
                style: self.style,
                operation: "prepare changes into",
            });
        }
        if edit.style != ListStyle::Edit {
            return Err(Error::InvalidStyle {
                style: edit.style,
                operation: "prepare changes from",
            });
        }
        for record in edit {
            if matches!(
                record.item().state(),
                DataState::Changed | DataState::Deleted | DataState::DelChg | DataState::Recovered
            ) {
                self.get_or_err(record.id())?;
            }
        }

        let version = self.version + 1;
        let mut prepared = 0;
        for record in edit {
            let change = record.item();
            match change.state() {
                DataState::New => {
                    let mut values = change.values().clone();
                    values.set_version(version);
                    values.set_deletion(false);
                    let mut item = DataItem::new(values);
                    if !self.contains(change.id()) {
                        item.set_id(change.id());
                    }
                    item.adjust_state(ListStyle::Core);
                    item.raise_edit_state(EditState::Dirty);
                    let mut copy = record.clone();
                    *copy.item_mut() = item;
                    let id = self.insert_record(copy)?;
                    if id != change.id() {
                        debug!(list = R::LIST_NAME, from = change.id(), to = id, "re-allocated id");
                    }
                }
                DataState::Changed => {
                    let item = self.item_or_err(change.id())?;
                    item.apply_values(change.values(), version);
                    item.values_mut().set_deletion(false);
                    item.adjust_state(ListStyle::Core);
                    item.raise_edit_state(EditState::Dirty);
                }
                DataState::Deleted | DataState::DelChg => {
                    let item = self.item_or_err(change.id())?;
                    if item.is_deleted() {
                        continue;
                    }
                    item.push_history(version);
                    item.values_mut().set_deletion(true);
                    item.adjust_state(ListStyle::Core);
                    item.raise_edit_state(EditState::Dirty);
                }
                DataState::Recovered => {
                    let item = self.item_or_err(change.id())?;
                    item.apply_values(change.values(), version);
                    item.values_mut().set_deletion(false);
                    item.set_restoring(true);
                    item.adjust_state(ListStyle::Core);
                    item.raise_edit_state(EditState::Dirty);
                }
                DataState::DelNew | DataState::Clean | DataState::NoState => continue,
            }
            prepared += 1;
        }

        if prepared > 0 {
            self.version = version;
            self.re_sort();
            self.combine_state();
        }
        info!(list = R::LIST_NAME, prepared, version, "prepared changes");
        Ok(prepared)
    }

    /// Makes the prepared changes final.
    ///
    /// Deleted records are removed and every other record becomes CLEAN at
    /// version 0. Returns the number of records that had pending changes.
    pub fn commit_changes(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|record| !record.item().is_deleted());
        let mut committed = before - self.items.len();

        let style = self.style;
        for record in &mut self.items {
            let item = record.item_mut();
            if item.has_history() || item.version() != 0 {
                committed += 1;
            }
            item.reset_as_clean();
            item.adjust_state(style);
        }
        self.version = 0;
        self.rebuild_index();
        self.combine_state();
        info!(list = R::LIST_NAME, committed, "committed changes");
        committed
    }

    /// Undoes the latest [`DataList::prepare_changes`].
    ///
    /// Returns `false` if there was nothing to roll back.
    pub fn roll_back_changes(&mut self) -> bool {
        if self.version == 0 {
            return false;
        }
        let version = self.version;
        self.rewind_to_version(version - 1);
        info!(list = R::LIST_NAME, version, "rolled back changes");
        true
    }
}
