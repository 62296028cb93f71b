// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Operations that build one list from others.
//!
//! - [`DataList::derive_list`] copies a list into a view of another style.
//! - [`DataList::derive_differences`] computes what turns one list into another.
//! - [`DataList::apply_differences`] replays such a difference list onto a list.
//! - [`DataList::re_base`] re-expresses a list relative to a new base.
//! - [`DataList::rewind_to_version`] undoes everything after a given version.
use super::DataList;
use crate::{
    Error, IdMap, RecordId, Result, create_id_map,
    item::{BaseRef, DataItem, Identifiable, Record},
    state::{DataState, EditState, ListStyle},
};
use tracing::debug;

fn live_records<R: Record>(list: &DataList<R>) -> IdMap<&R> {
    let mut map = create_id_map(list.len());
    for record in list.iter().filter(|record| !record.item().is_deleted()) {
        map.insert(record.id(), record);
    }
    map
}

fn tombstone<R: Record>(record: &R) -> R {
    let mut values = record.item().values().clone();
    values.set_version(0);
    values.set_deletion(true);
    let mut item = DataItem::new(values);
    item.set_id(record.id());
    R::from_item(item)
}

impl<R: Record> DataList<R> {
    /// Copies this list into a new list of `style`.
    ///
    /// | style  | records           | base    | history |
    /// |--------|-------------------|---------|---------|
    /// | EDIT   | all               | set     | cleared |
    /// | VIEW   | all               | set     | cleared |
    /// | UPDATE | all but CLEAN     | set     | kept    |
    /// | COPY   | all               | set     | kept    |
    /// | CLONE  | all but deleted   | none    | cleared |
    ///
    /// A clone is an independent CORE list rather than a view.
    ///
    /// # Errors
    ///
    /// CORE and DIFFER lists cannot be derived.
    pub fn derive_list(&self, style: ListStyle) -> Result<DataList<R>> {
        if matches!(style, ListStyle::Core | ListStyle::Differ) {
            return Err(Error::InvalidStyle {
                style,
                operation: "derive",
            });
        }
        let target = if style == ListStyle::Clone {
            ListStyle::Core
        } else {
            style
        };
        let mut derived = self.new_empty_like(target);
        if matches!(style, ListStyle::Update | ListStyle::Copy) {
            derived.version = self.version;
        }

        for record in &self.items {
            let source = record.item();
            match style {
                ListStyle::Update if source.state() == DataState::Clean => continue,
                ListStyle::Clone if source.is_deleted() => continue,
                _ => {}
            }
            let mut copy = record.clone();
            let item = copy.item_mut();
            match style {
                ListStyle::Clone => {
                    item.set_base(None);
                    item.reset_as_clean();
                    item.adjust_state(ListStyle::Core);
                }
                ListStyle::Edit | ListStyle::View => {
                    item.set_base(Some(BaseRef::of(source)));
                    item.reset_as_clean();
                    item.set_state(DataState::Clean, style)?;
                }
                _ => item.set_base(Some(BaseRef::of(source))),
            }
            derived.items.push(copy);
        }

        derived.rebuild_index();
        derived.combine_state();
        debug!(
            list = R::LIST_NAME,
            %style,
            records = derived.len(),
            "derived list"
        );
        Ok(derived)
    }

    /// Builds the DIFFER list that turns `old` into this list.
    ///
    /// Records only in `self` appear NEW, records in both whose values differ
    /// appear CHANGED with `old`'s values as their original, and records only in
    /// `old` appear as DELETED tombstones. Deleted records count as absent on both
    /// sides.
    pub fn derive_differences(&self, old: &DataList<R>) -> DataList<R> {
        let mut remaining = live_records(old);
        let mut diff = self.new_empty_like(ListStyle::Differ);
        diff.version = 1;
        let (mut added, mut changed) = (0, 0);

        for record in self.iter().filter(|record| !record.item().is_deleted()) {
            let source = record.item();
            let mut values = source.values().clone();
            values.set_version(1);
            let mut item = DataItem::new(values);
            item.set_id(source.id());

            match remaining.remove(&source.id()) {
                None => added += 1,
                Some(prior) if source.values().differs(prior.item().values()).is_identical() => {
                    continue;
                }
                Some(prior) => {
                    let mut original = prior.item().values().clone();
                    original.set_version(0);
                    item.history_mut().set_history(&original);
                    changed += 1;
                }
            }
            item.adjust_state(ListStyle::Differ);
            let mut copy = record.clone();
            *copy.item_mut() = item;
            diff.items.push(copy);
        }

        let deleted = remaining.len();
        for prior in remaining.into_values() {
            let mut stone = tombstone(prior);
            stone.item_mut().adjust_state(ListStyle::Differ);
            diff.items.push(stone);
        }

        diff.re_sort();
        debug!(list = R::LIST_NAME, added, changed, deleted, "derived differences");
        diff
    }

    /// Applies a DIFFER list to this list as one new version.
    ///
    /// The changes go into history, so they can be committed or rolled back like
    /// prepared changes. Nothing is applied if any record of `diff` does not fit.
    ///
    /// # Errors
    ///
    /// Fails if `diff` is not a DIFFER list, if a NEW record's id is taken, or if
    /// a changed or deleted record does not exist.
    pub fn apply_differences(&mut self, diff: &DataList<R>) -> Result<usize> {
        if diff.style != ListStyle::Differ {
            return Err(Error::InvalidStyle {
                style: diff.style,
                operation: "apply differences from",
            });
        }
        for record in diff {
            let id = record.id();
            match record.item().state() {
                DataState::New if self.contains(id) => {
                    return Err(Error::DuplicateId {
                        list: R::LIST_NAME,
                        id,
                    });
                }
                DataState::New => {}
                _ => {
                    self.get_or_err(id)?;
                }
            }
        }

        let version = self.version + 1;
        let style = self.style;
        let mut applied = 0;
        for record in diff {
            let change = record.item();
            match change.state() {
                DataState::New => {
                    let mut values = change.values().clone();
                    values.set_version(version);
                    let mut item = DataItem::new(values);
                    item.set_id(change.id());
                    item.adjust_state(style);
                    item.raise_edit_state(EditState::Dirty);
                    let mut copy = record.clone();
                    *copy.item_mut() = item;
                    self.insert_record(copy)?;
                }
                DataState::Changed => {
                    let item = self.item_or_err(change.id())?;
                    item.apply_values(change.values(), version);
                    item.values_mut().set_deletion(false);
                    item.adjust_state(style);
                    item.raise_edit_state(EditState::Dirty);
                }
                DataState::Deleted => {
                    let item = self.item_or_err(change.id())?;
                    item.push_history(version);
                    item.values_mut().set_deletion(true);
                    item.adjust_state(style);
                    item.raise_edit_state(EditState::Dirty);
                }
                _ => continue,
            }
            applied += 1;
        }

        if applied > 0 {
            self.version = version;
            self.re_sort();
            self.combine_state();
        }
        debug!(list = R::LIST_NAME, applied, version, "applied differences");
        Ok(applied)
    }

    /// Re-expresses this list relative to `base`.
    ///
    /// Afterwards every record's state says how it differs from its counterpart in
    /// `base`: records `base` lacks are NEW, records with different values are
    /// CHANGED, identical records are CLEAN, and records only `base` has are added
    /// as DELETED tombstones. Returns the number of records that differ.
    pub fn re_base(&mut self, base: &DataList<R>) -> usize {
        let mut remaining = live_records(base);
        let version = self.version + 1;
        let style = self.style;
        let mut stale: Vec<RecordId> = Vec::new();
        let mut differing = 0;

        for record in &mut self.items {
            let id = record.id();
            let item = record.item_mut();
            match remaining.remove(&id) {
                None if item.is_deleted() => {
                    stale.push(id);
                    continue;
                }
                None => {
                    item.clear_history();
                    item.values_mut().set_version(version);
                    item.set_base(None);
                    differing += 1;
                }
                Some(prior) => {
                    let prior = prior.item();
                    item.set_base(Some(BaseRef::of(prior)));
                    item.clear_history();
                    if item.values().differs(prior.values()).is_identical() {
                        item.values_mut().set_version(0);
                    } else {
                        let mut original = prior.values().clone();
                        original.set_version(0);
                        item.history_mut().set_history(&original);
                        item.values_mut().set_version(version);
                        differing += 1;
                    }
                }
            }
            item.adjust_state(style);
        }

        for id in stale {
            self.unlink(id);
        }
        let leftover = remaining.len();
        for prior in remaining.into_values() {
            let mut stone = tombstone(prior);
            let item = stone.item_mut();
            item.set_base(Some(BaseRef::of(prior.item())));
            item.adjust_state(style);
            self.items.push(stone);
        }
        differing += leftover;

        if differing > 0 {
            self.version = version;
        }
        self.re_sort();
        self.combine_state();
        debug!(list = R::LIST_NAME, differing, "re-based list");
        differing
    }

    /// Undoes everything that happened after `version`.
    ///
    /// Records created after `version` are dropped, the others roll back to their
    /// latest snapshot at or below it. The list is re-validated afterwards.
    pub fn rewind_to_version(&mut self, version: u32) -> EditState {
        let before = self.items.len();
        self.items
            .retain(|record| record.item().original_values().version() <= version);
        let dropped = before - self.items.len();

        let style = self.style;
        for record in &mut self.items {
            let item = record.item_mut();
            item.history_mut().rewind_to_version(version);
            item.set_restoring(false);
            item.adjust_state(style);
        }
        self.version = self.version.min(version);
        self.re_sort();
        debug!(list = R::LIST_NAME, version, dropped, "rewound list");
        self.validate()
    }
}
