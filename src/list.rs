// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Ordered, id-indexed collections of records.
//!
//! A [`DataList`] owns records of one type, kept sorted by [`Record::compare`] with
//! ties broken by id, and an [`IdIndex`] from id to position. Its [`ListStyle`]
//! says what role the list plays: the CORE list mirrors the backing store, the other
//! styles are views derived from it (see [`DataList::derive_list`]).
//!
//! Records are changed through an [`ItemEdit`] obtained from
//! [`DataList::begin_edit`], which takes care of history and state bookkeeping.
use crate::{
    Error, RecordId, Result,
    index::IdIndex,
    item::{DataItem, Identifiable, Record, ValidationErrors},
    state::{DataState, EditState, ListStyle},
    values::ValueSet,
};
use std::cmp::Ordering;

mod algebra;
mod changes;
mod edit;
mod security;

pub use edit::ItemEdit;

#[derive(Clone, Debug)]
pub struct DataList<R: Record> {
    style: ListStyle,
    generation: u32,
    version: u32,
    edit_state: EditState,
    items: Vec<R>,
    index: IdIndex,
}

fn order<R: Record>(a: &R, b: &R) -> Ordering {
    a.compare(b).then_with(|| a.id().cmp(&b.id()))
}

impl<R: Record> DataList<R> {
    pub fn new(style: ListStyle) -> Self {
        Self::with_generation(style, 0)
    }

    pub fn with_generation(style: ListStyle, generation: u32) -> Self {
        Self {
            style,
            generation,
            version: 0,
            edit_state: EditState::Clean,
            items: Vec::new(),
            index: IdIndex::new(),
        }
    }

    /// An empty list of the same generation that keeps allocating ids after this
    /// list's.
    pub fn new_empty_like(&self, style: ListStyle) -> Self {
        Self {
            index: IdIndex::continuing(&self.index),
            ..Self::with_generation(style, self.generation)
        }
    }

    pub fn style(&self) -> ListStyle {
        self.style
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The latest version any record of this list was changed at.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn edit_state(&self) -> EditState {
        self.edit_state
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.items.iter().map(Identifiable::id)
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.index.get(id).map(|position| &self.items[position])
    }

    /// Mutable access for runtime-only record data.
    ///
    /// Field values are changed through [`DataList::begin_edit`].
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut R> {
        self.index.get(id).map(|position| &mut self.items[position])
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.index.get(id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.index.contains(id)
    }

    fn not_found(&self, id: RecordId) -> Error {
        Error::NotFound {
            list: R::LIST_NAME,
            id,
        }
    }

    fn get_or_err(&self, id: RecordId) -> Result<&R> {
        self.get(id).ok_or_else(|| self.not_found(id))
    }

    fn item_or_err(&mut self, id: RecordId) -> Result<&mut DataItem> {
        match self.index.get(id) {
            Some(position) => Ok(self.items[position].item_mut()),
            None => Err(self.not_found(id)),
        }
    }

    /// Adds a record as read from the backing store.
    ///
    /// The values are stored at version 0, so the record starts out CLEAN. An `id`
    /// of 0 allocates a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the id is already taken, and
    /// [`Error::IdOutOfRange`] if it exceeds [`IdIndex::MAX_ID`].
    pub fn add_loaded(&mut self, id: RecordId, mut values: ValueSet) -> Result<RecordId> {
        values.set_version(0);
        let mut item = DataItem::new(values);
        item.set_id(id);
        item.adjust_state(self.style);
        self.insert_record(R::from_item(item))
    }

    /// Adds a brand new record at the next list version.
    pub fn add_new(&mut self, values: ValueSet) -> RecordId {
        self.add_new_at(values, self.version + 1)
    }

    /// Adds a brand new record at `version`, which becomes the list version if it
    /// is newer. Records added in one step share a version and roll back together.
    pub(crate) fn add_new_at(&mut self, mut values: ValueSet, version: u32) -> RecordId {
        self.version = self.version.max(version);
        values.set_version(version);
        values.set_deletion(false);
        let mut item = DataItem::new(values);
        item.set_id(self.index.allocate());
        item.adjust_state(self.style);
        item.raise_edit_state(EditState::Dirty);
        self.edit_state = self.edit_state.combine(EditState::Dirty);
        let record = R::from_item(item);
        let id = record.id();
        // freshly allocated, so it cannot clash
        let position = self.insert_position(&record);
        self.place(position, record);
        id
    }

    /// Inserts `record` in list order, allocating an id if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the record's id is already taken, and
    /// [`Error::IdOutOfRange`] if it exceeds [`IdIndex::MAX_ID`].
    pub fn add_record(&mut self, record: R) -> Result<RecordId> {
        self.insert_record(record)
    }

    pub(crate) fn insert_record(&mut self, mut record: R) -> Result<RecordId> {
        let id = match record.id() {
            0 => self.index.allocate(),
            id if self.index.contains(id) => {
                return Err(Error::DuplicateId {
                    list: R::LIST_NAME,
                    id,
                });
            }
            id if id > IdIndex::MAX_ID => {
                return Err(Error::IdOutOfRange {
                    list: R::LIST_NAME,
                    id,
                });
            }
            id => id,
        };
        record.item_mut().set_id(id);
        let position = self.insert_position(&record);
        self.place(position, record);
        Ok(id)
    }

    fn insert_position(&self, record: &R) -> usize {
        self.items
            .partition_point(|probe| order(probe, record) == Ordering::Less)
    }

    fn place(&mut self, position: usize, record: R) {
        self.items.insert(position, record);
        self.reindex_from(position);
    }

    /// Detaches a record from the list and hands it back.
    pub fn unlink(&mut self, id: RecordId) -> Option<R> {
        let position = self.index.remove(id)?;
        let record = self.items.remove(position);
        self.reindex_from(position);
        Some(record)
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, record) in self.items[start..].iter().enumerate() {
            self.index.set(record.id(), start + offset);
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.reindex_from(0);
    }

    /// Restores list order after values that [`Record::compare`] looks at changed.
    pub fn re_sort(&mut self) {
        self.items.sort_by(order);
        self.rebuild_index();
    }

    /// Starts an edit of the record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such record.
    pub fn begin_edit(&mut self, id: RecordId) -> Result<ItemEdit<'_, R>> {
        let position = self.index.get(id).ok_or_else(|| self.not_found(id))?;
        Ok(ItemEdit::new(self, position))
    }

    /// Deletes a record as a single, undoable edit.
    pub fn delete_item(&mut self, id: RecordId) -> Result<()> {
        let mut edit = self.begin_edit(id)?;
        edit.delete();
        edit.commit();
        Ok(())
    }

    /// Deletes several records as one undoable step at the next list version.
    ///
    /// Returns the number of records that were not deleted already.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if any id is missing; nothing is deleted then.
    pub fn delete_items(&mut self, ids: &[RecordId]) -> Result<usize> {
        self.delete_items_at(ids, self.version + 1)
    }

    /// Like [`DataList::delete_items`], at `version`, which becomes the list
    /// version if it is newer. Records deleted in one step roll back together.
    pub(crate) fn delete_items_at(&mut self, ids: &[RecordId], version: u32) -> Result<usize> {
        let positions = ids
            .iter()
            .map(|&id| self.index.get(id).ok_or_else(|| self.not_found(id)))
            .collect::<Result<Vec<_>>>()?;
        let style = self.style;
        let mut deleted = 0;
        for position in positions {
            let item = self.items[position].item_mut();
            if item.is_deleted() {
                continue;
            }
            item.push_history(version);
            item.values_mut().set_deletion(true);
            item.adjust_state(style);
            item.raise_edit_state(EditState::Dirty);
            deleted += 1;
        }
        if deleted > 0 {
            self.version = self.version.max(version);
            self.validate();
        }
        Ok(deleted)
    }

    /// Brings a deleted record back as a single, undoable edit.
    pub fn recover_item(&mut self, id: RecordId) -> Result<()> {
        let mut edit = self.begin_edit(id)?;
        edit.recover();
        edit.commit();
        Ok(())
    }

    /// Moves a record through the lifecycle without touching its history.
    ///
    /// # Errors
    ///
    /// Fails if the record does not exist or the transition is not allowed.
    pub fn set_item_state(&mut self, id: RecordId, state: DataState) -> Result<()> {
        let style = self.style;
        self.item_or_err(id)?.set_state(state, style)?;
        if state == DataState::Changed {
            self.edit_state = self.edit_state.combine(EditState::Dirty);
        }
        Ok(())
    }

    /// Increments the reference count of a record.
    pub fn touch(&mut self, id: RecordId) -> Result<()> {
        self.item_or_err(id)?.touch();
        Ok(())
    }

    pub fn clear_touches(&mut self) {
        for record in &mut self.items {
            record.item_mut().clear_touches();
        }
    }

    /// Validates every live record and recomputes the list's edit state.
    pub fn validate(&mut self) -> EditState {
        let reports: Vec<_> = self
            .items
            .iter()
            .map(|record| {
                let mut errors = ValidationErrors::new();
                if !record.item().is_deleted() {
                    record.validate(self, &mut errors);
                }
                errors.into_vec()
            })
            .collect();
        for (record, errors) in self.items.iter_mut().zip(reports) {
            record.item_mut().apply_validation(errors);
        }
        self.combine_state()
    }

    /// Rolls the edit states of the records up into the list's.
    pub fn combine_state(&mut self) -> EditState {
        self.edit_state = self
            .items
            .iter()
            .map(|record| record.item().list_edit_state())
            .fold(EditState::Clean, EditState::combine);
        self.edit_state
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|record| record.item().has_errors())
    }

    /// Whether any record has something a backing store would have to write.
    pub fn has_updates(&self) -> bool {
        self.items
            .iter()
            .any(|record| !matches!(record.item().state(), DataState::Clean | DataState::NoState))
    }

    /// Records in the given state.
    pub fn in_state(&self, state: DataState) -> impl Iterator<Item = &R> {
        self.items
            .iter()
            .filter(move |record| record.item().state() == state)
    }
}

impl<'a, R: Record> IntoIterator for &'a DataList<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
