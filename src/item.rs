// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Records and the state they share.
//!
//! A record type is any struct that embeds a [`DataItem`] and implements
//! [`Record`] for it. The `DataItem` carries everything the list machinery needs:
//! the id, the lifecycle states, the link to the record this one is a view of, and
//! the value history. The record type adds its schema ([`Record::FIELDS`]), its
//! natural ordering and its validation rules, and may keep runtime-only data of its
//! own next to the item.
use crate::{
    Error, RecordId, Result,
    history::ValueSetHistory,
    list::DataList,
    security::CipherSet,
    state::{DataState, EditState, ListStyle},
    values::{Difference, FieldDef, FieldId, FieldValue, Value, ValueSet},
};
use std::{cmp::Ordering, fmt};

/// A record type stored in a [`DataList`].
///
/// # Example
///
/// ```rust
/// use std::cmp::Ordering;
/// use verdata::{DataItem, DataList, FieldDef, Record, ValidationErrors};
///
/// #[derive(Clone, Debug)]
/// struct Payee {
///     item: DataItem,
/// }
///
/// impl Payee {
///     const NAME: usize = 0;
///
///     fn name(&self) -> &str {
///         self.item.value(Self::NAME).and_then(|v| v.as_text()).unwrap_or_default()
///     }
/// }
///
/// impl Record for Payee {
///     const LIST_NAME: &'static str = "Payees";
///     const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Name")];
///
///     fn item(&self) -> &DataItem {
///         &self.item
///     }
///     fn item_mut(&mut self) -> &mut DataItem {
///         &mut self.item
///     }
///     fn from_item(item: DataItem) -> Self {
///         Self { item }
///     }
///
///     fn compare(&self, other: &Self) -> Ordering {
///         self.name().cmp(other.name())
///     }
///
///     fn validate(&self, _list: &DataList<Self>, errors: &mut ValidationErrors) {
///         if self.name().is_empty() {
///             errors.add(Self::NAME, "Name is required");
///         }
///     }
/// }
/// ```
#[expect(unused_variables)]
pub trait Record: Clone + fmt::Debug + 'static {
    /// Name of the list this record type lives in, used in errors and logs.
    const LIST_NAME: &'static str;

    /// The schema: one entry per field slot of the record's [`ValueSet`]s.
    const FIELDS: &'static [FieldDef];

    fn item(&self) -> &DataItem;

    fn item_mut(&mut self) -> &mut DataItem;

    /// Builds a record around an item, with any runtime-only data left empty.
    fn from_item(item: DataItem) -> Self;

    /// Natural order of records within a list. Ties are broken by id.
    fn compare(&self, other: &Self) -> Ordering {
        Ordering::Equal
    }

    /// Checks the record's values, reporting problems into `errors`.
    ///
    /// Deleted records are not validated.
    fn validate(&self, list: &DataList<Self>, errors: &mut ValidationErrors) {}

    /// An empty snapshot with one slot per field.
    fn new_values() -> ValueSet {
        ValueSet::new(Self::FIELDS.len())
    }

    fn has_encrypted_fields() -> bool {
        Self::FIELDS.iter().any(FieldDef::is_encrypted)
    }
}

/// Anything with a record id.
pub trait Identifiable {
    fn id(&self) -> RecordId;
}

impl<R: Record> Identifiable for R {
    fn id(&self) -> RecordId {
        self.item().id()
    }
}

/// Reads a required field of `record` through `extract`.
///
/// # Errors
///
/// Returns [`Error::FieldType`] if the field is unset or `extract` rejects it.
pub(crate) fn required<'a, R: Record, T>(
    record: &'a R,
    field: FieldId,
    expected: &'static str,
    extract: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<T> {
    record
        .item()
        .value(field)
        .and_then(extract)
        .ok_or(Error::FieldType {
            list: R::LIST_NAME,
            field: R::FIELDS.get(field).map_or("?", |def| def.name),
            expected,
        })
}

/// The record a view record was derived from, as seen at derivation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseRef {
    pub id: RecordId,
    pub state: DataState,
}

impl BaseRef {
    pub fn of(item: &DataItem) -> Self {
        Self {
            id: item.id,
            state: item.state,
        }
    }
}

/// A validation problem, either with one field or with the record as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<FieldId>,
    pub message: String,
}

/// Collects the problems [`Record::validate`] finds.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: FieldId, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: Some(field),
            message: message.into(),
        });
    }

    pub fn add_record(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: None,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub(crate) fn into_vec(self) -> Vec<FieldError> {
        self.errors
    }
}

/// The state every record carries.
#[derive(Clone)]
pub struct DataItem {
    id: RecordId,
    state: DataState,
    edit_state: EditState,
    base: Option<BaseRef>,
    touches: u32,
    restoring: bool,
    errors: Vec<FieldError>,
    history: ValueSetHistory,
}

impl DataItem {
    /// An unallocated item (id 0) holding `values`.
    pub fn new(values: ValueSet) -> Self {
        Self {
            id: 0,
            state: DataState::NoState,
            edit_state: EditState::Clean,
            base: None,
            touches: 0,
            restoring: false,
            errors: Vec::new(),
            history: ValueSetHistory::new(values),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    pub fn state(&self) -> DataState {
        self.state
    }

    pub fn edit_state(&self) -> EditState {
        self.edit_state
    }

    pub fn base(&self) -> Option<BaseRef> {
        self.base
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    pub(crate) fn set_base(&mut self, base: Option<BaseRef>) {
        self.base = base;
    }

    /// The current snapshot.
    pub fn values(&self) -> &ValueSet {
        self.history.current()
    }

    pub(crate) fn values_mut(&mut self) -> &mut ValueSet {
        self.history.current_mut()
    }

    pub fn original_values(&self) -> &ValueSet {
        self.history.original()
    }

    /// The current plaintext value of `field`.
    pub fn value(&self, field: FieldId) -> Option<&Value> {
        self.values().value(field)
    }

    pub fn is_deleted(&self) -> bool {
        self.values().is_deletion()
    }

    /// Version of the current snapshot.
    pub fn version(&self) -> u32 {
        self.values().version()
    }

    pub fn history(&self) -> &ValueSetHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ValueSetHistory {
        &mut self.history
    }

    pub fn has_history(&self) -> bool {
        self.history.has_history()
    }

    pub fn push_history(&mut self, version: u32) {
        self.history.push_history(version);
    }

    pub fn pop_history(&mut self) -> bool {
        self.history.pop_history()
    }

    pub fn maybe_pop_history(&mut self) -> bool {
        self.history.maybe_pop_history()
    }

    pub fn reset_history(&mut self) {
        self.history.reset_history();
    }

    pub fn clear_history(&mut self) {
        self.history.clear_history();
    }

    /// Seeds this item's history with the original snapshot of `base`.
    pub fn set_history(&mut self, base: &DataItem) {
        self.history.set_history(base.original_values());
    }

    pub fn field_changed(&self, field: FieldId) -> Difference {
        self.history.field_changed(field)
    }

    pub fn determine_state(&self, style: ListStyle) -> DataState {
        DataState::determine(style, self.has_base(), &self.history)
    }

    /// Recomputes the data state from the history.
    pub fn adjust_state(&mut self, style: ListStyle) -> DataState {
        self.state = self.determine_state(style);
        self.state
    }

    /// Moves the item to `state`, adjusting its deletion flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for transitions the lifecycle does not
    /// allow, such as recovering a record that is not deleted.
    pub fn set_state(&mut self, state: DataState, style: ListStyle) -> Result<()> {
        let invalid = Error::InvalidTransition {
            from: self.state,
            to: state,
        };
        let (next, deleted) = match state {
            DataState::New => (DataState::New, false),
            DataState::Clean => match self.base {
                Some(base) if base.state.is_deletion() => (DataState::Deleted, true),
                None if style == ListStyle::Edit => (DataState::New, false),
                _ => (DataState::Clean, false),
            },
            DataState::Recovered => (self.state.recovered().ok_or(invalid)?, false),
            DataState::Changed => (self.state.changed(), false),
            DataState::Deleted => (self.state.deleted(), true),
            DataState::NoState | DataState::DelNew | DataState::DelChg => return Err(invalid),
        };
        self.state = next;
        self.history.current_mut().set_deletion(deleted);
        self.edit_state = if state == DataState::Clean {
            EditState::Clean
        } else {
            self.edit_state.combine(EditState::Dirty)
        };
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages of the validation errors reported against `field`.
    pub fn field_errors(&self, field: FieldId) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |error| error.field == Some(field))
            .map(|error| error.message.as_str())
    }

    pub(crate) fn apply_validation(&mut self, errors: Vec<FieldError>) {
        self.edit_state = if !errors.is_empty() {
            EditState::Error
        } else if matches!(self.state, DataState::Clean | DataState::NoState) {
            EditState::Clean
        } else {
            EditState::Valid
        };
        self.errors = errors;
    }

    pub(crate) fn raise_edit_state(&mut self, floor: EditState) {
        self.edit_state = self.edit_state.combine(floor);
    }

    /// What this item adds to its list's edit state.
    pub(crate) fn list_edit_state(&self) -> EditState {
        let clean_base = self.base.is_some_and(|base| base.state == DataState::Clean);
        if self.is_deleted() && clean_base {
            EditState::Valid
        } else {
            self.edit_state
        }
    }

    /// Marks the item as referenced by another record.
    pub fn touch(&mut self) {
        self.touches += 1;
    }

    pub fn untouch(&mut self) {
        self.touches = self.touches.saturating_sub(1);
    }

    pub fn clear_touches(&mut self) {
        self.touches = 0;
    }

    /// Whether anything references this item.
    pub fn is_active(&self) -> bool {
        self.touches > 0
    }

    /// Set on core records that [`DataList::prepare_changes`] brought back from
    /// deletion, until the change is committed or rolled back.
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub(crate) fn set_restoring(&mut self, restoring: bool) {
        self.restoring = restoring;
    }

    /// Forgets history and derived state, keeping the current values at version 0.
    pub(crate) fn reset_as_clean(&mut self) {
        self.history.clear_history();
        self.history.current_mut().set_version(0);
        self.edit_state = EditState::Clean;
        self.errors.clear();
        self.restoring = false;
    }

    /// Pushes `version` and copies the fields of `source` into it.
    pub(crate) fn apply_values(&mut self, source: &ValueSet, version: u32) {
        self.history.push_history(version);
        self.history.current_mut().copy_fields_from(source);
    }

    /// Whether any encrypted field is missing its ciphertext or was produced under
    /// another control key.
    pub fn needs_security_update(&self, control_key: RecordId) -> bool {
        self.values()
            .encrypted_fields()
            .any(|(_, field)| !field.is_encrypted() || field.control_key() != Some(control_key))
    }

    /// Re-encrypts every encrypted field under `cipher` in a new history step.
    pub(crate) fn update_security(&mut self, cipher: &CipherSet, version: u32) -> Result<()> {
        self.history.push_history(version);
        let outcome = self
            .history
            .current_mut()
            .encrypted_fields_mut()
            .try_for_each(|(_, field)| field.encrypt_value(cipher));
        if outcome.is_err() {
            self.history.pop_history();
        }
        outcome
    }

    /// Takes over ciphertext from the same fields of `base` where it still fits,
    /// encrypting under `cipher` otherwise.
    pub(crate) fn adopt_security(&mut self, cipher: &CipherSet, base: Option<&DataItem>) -> Result<()> {
        let base_values = base.map(DataItem::values);
        for (field, encrypted) in self.history.current_mut().encrypted_fields_mut() {
            match base_values
                .and_then(|values| values.get(field))
                .and_then(FieldValue::as_encrypted)
            {
                Some(prior) => encrypted.adopt_encryption(cipher, prior)?,
                None => encrypted.encrypt_value(cipher)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DataItem");
        s.field("id", &self.id)
            .field("state", &self.state)
            .field("edit_state", &self.edit_state);
        if let Some(base) = &self.base {
            s.field("base", base);
        }
        if self.restoring {
            s.field("restoring", &true);
        }
        if !self.errors.is_empty() {
            s.field("errors", &self.errors);
        }
        s.field("history", &self.history).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Payee;

    fn item(name: &str) -> DataItem {
        let mut item = DataItem::new(Payee::values(name));
        item.set_id(1);
        item
    }

    fn with_base(mut item: DataItem, state: DataState) -> DataItem {
        item.set_base(Some(BaseRef { id: 1, state }));
        item
    }

    #[test]
    fn set_state_new_clears_deletion() {
        let mut item = item("Bank");
        item.values_mut().set_deletion(true);
        item.set_state(DataState::New, ListStyle::Core).unwrap();
        assert_eq!(item.state(), DataState::New);
        assert!(!item.is_deleted());
        assert_eq!(item.edit_state(), EditState::Dirty);
    }

    #[test]
    fn set_state_clean() {
        let mut core = item("Bank");
        core.set_state(DataState::Clean, ListStyle::Core).unwrap();
        assert_eq!(core.state(), DataState::Clean);

        // an edit record without a base has nowhere to be clean against
        let mut orphan = item("Bank");
        orphan.set_state(DataState::Clean, ListStyle::Edit).unwrap();
        assert_eq!(orphan.state(), DataState::New);

        let mut deleted_base = with_base(item("Bank"), DataState::Deleted);
        deleted_base
            .set_state(DataState::Clean, ListStyle::Edit)
            .unwrap();
        assert_eq!(deleted_base.state(), DataState::Deleted);
        assert!(deleted_base.is_deleted());
        assert_eq!(deleted_base.edit_state(), EditState::Clean);
    }

    #[test]
    fn delete_then_recover() {
        let mut item = with_base(item("Bank"), DataState::Clean);
        item.set_state(DataState::Clean, ListStyle::Edit).unwrap();
        item.set_state(DataState::Changed, ListStyle::Edit).unwrap();
        item.set_state(DataState::Deleted, ListStyle::Edit).unwrap();
        assert_eq!(item.state(), DataState::DelChg);
        assert!(item.is_deleted());

        item.set_state(DataState::Recovered, ListStyle::Edit).unwrap();
        assert_eq!(item.state(), DataState::Changed);
        assert!(!item.is_deleted());
    }

    #[test]
    fn invalid_transitions() {
        let mut item = item("Bank");
        item.set_state(DataState::New, ListStyle::Core).unwrap();
        let err = item
            .set_state(DataState::Recovered, ListStyle::Core)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move a record from NEW to RECOVERED");
        assert!(item.set_state(DataState::DelNew, ListStyle::Core).is_err());
        assert_eq!(item.state(), DataState::New);
    }

    #[test]
    fn adjust_state_follows_history() {
        let mut item = with_base(item("Bank"), DataState::Clean);
        assert_eq!(item.adjust_state(ListStyle::Edit), DataState::Clean);
        item.push_history(1);
        item.values_mut().set(Payee::NAME, "Bank A");
        assert_eq!(item.adjust_state(ListStyle::Edit), DataState::Changed);
        assert_eq!(item.field_changed(Payee::NAME), Difference::Different);
        assert!(item.pop_history());
        assert_eq!(item.adjust_state(ListStyle::Edit), DataState::Clean);
    }

    #[test]
    fn validation_errors() {
        let mut item = item("");
        let mut errors = ValidationErrors::new();
        errors.add(Payee::NAME, "Name is required");
        errors.add_record("Payee is broken");
        item.apply_validation(errors.into_vec());
        assert!(item.has_errors());
        assert_eq!(item.edit_state(), EditState::Error);
        assert_eq!(
            item.field_errors(Payee::NAME).collect::<Vec<_>>(),
            vec!["Name is required"]
        );
        item.apply_validation(Vec::new());
        assert_eq!(item.edit_state(), EditState::Clean);
    }

    #[test]
    fn touches() {
        let mut item = item("Bank");
        assert!(!item.is_active());
        item.touch();
        item.touch();
        item.untouch();
        assert!(item.is_active());
        item.clear_touches();
        item.untouch();
        assert!(!item.is_active());
    }
}
