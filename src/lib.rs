// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # verdata: a versioned, field-encrypted record store
//!
//! This crate provides the in-memory data model underneath a personal-finance style
//! application: lists of typed records that keep a per-record undo history, can be
//! viewed through derived copies (edit views, update sets, difference lists), and
//! store selected fields encrypted under a rotating key hierarchy.
//!
//! Nothing here talks to a disk or a database. A backing store feeds raw rows in
//! through the loaders, and reads records (and their [`DataState`]) back out when it
//! is time to persist.
//!
//! ## Core Concepts
//!
//! - [`ValueSet`]: one immutable snapshot of a record's fields, tagged with a
//!   version and a deletion flag.
//! - [`ValueSetHistory`]: the stack of snapshots a record has been through. Every
//!   edit pushes a snapshot; undo pops it.
//! - [`Record`] / [`DataItem`]: the trait your record types implement, and the
//!   shared state (id, [`DataState`], [`EditState`], history) they embed.
//! - [`DataList`]: an ordered, id-indexed collection of one record type, tagged
//!   with a [`ListStyle`] that says what kind of view it is.
//! - [`DataSet`]: your lists together with the key hierarchy
//!   ([`ControlKey`](keys::ControlKey), [`DataKey`](keys::DataKey),
//!   [`ControlData`](keys::ControlData)).
//!
//! ## Lists and Views
//!
//! The CORE list is the source of truth. Editing happens on an EDIT view derived
//! from it; once the user is done, the edit view is folded back into the core list
//! in three steps:
//!
//! 1. [`DataList::prepare_changes`] copies every changed, new, deleted or recovered
//!    edit record back into the core list, pushing history so that the step can be
//!    undone.
//! 2. The caller persists the prepared records.
//! 3. [`DataList::commit_changes`] makes the core list clean again, or
//!    [`DataList::roll_back_changes`] undoes step 1 if persisting failed.
//!
//! The remaining list algebra (derive, diff, rebase, rewind) lives in
//! [`list`].
//!
//! ## Example
//!
//! ```rust
//! use verdata::{
//!     DataItem, DataList, DataState, FieldDef, ListStyle, Record, ValueSet, Value,
//! };
//!
//! #[derive(Clone, Debug)]
//! struct Payee {
//!     item: DataItem,
//! }
//!
//! impl Payee {
//!     const NAME: usize = 0;
//! }
//!
//! impl Record for Payee {
//!     const LIST_NAME: &'static str = "Payees";
//!     const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Name")];
//!
//!     fn item(&self) -> &DataItem {
//!         &self.item
//!     }
//!     fn item_mut(&mut self) -> &mut DataItem {
//!         &mut self.item
//!     }
//!     fn from_item(item: DataItem) -> Self {
//!         Self { item }
//!     }
//! }
//!
//! // load a record from the backing store
//! let mut core = DataList::<Payee>::new(ListStyle::Core);
//! let mut values = Payee::new_values();
//! values.set(Payee::NAME, "Bank");
//! let id = core.add_loaded(1, values).unwrap();
//!
//! // edit it through an edit view
//! let mut edit = core.derive_list(ListStyle::Edit).unwrap();
//! let mut tx = edit.begin_edit(id).unwrap();
//! tx.set(Payee::NAME, "Bank A");
//! assert!(tx.commit());
//! assert_eq!(edit.get(id).unwrap().item().state(), DataState::Changed);
//!
//! // fold the edit back into the core list
//! core.prepare_changes(&edit).unwrap();
//! core.commit_changes();
//! let payee = core.get(id).unwrap().item();
//! assert_eq!(payee.value(Payee::NAME), Some(&Value::from("Bank A")));
//! assert_eq!(payee.state(), DataState::Clean);
//! ```
//!
//! ## Encryption
//!
//! Fields declared with [`FieldDef::encrypted`] hold an
//! [`EncryptedField`](encrypted::EncryptedField): the plaintext value together with
//! its ciphertext under the dataset's active [`CipherSet`](security::CipherSet).
//! Re-keying ([`DataSet::renew_security`]) re-encrypts every such field under a new
//! control key and then retires the old keys; the plaintext never changes.
//!
//! ## Features
//!
//! - `json`: Enables rendering lists to `serde_json::Value`. This feature is enabled by
//!   default.
//! - `serde`: Provides `serde` support for values, states and list styles.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for value types, useful for
//!   property-based testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make benchmarks and tests have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

/// Macros for declaring id-validated static enumerations.
pub mod macros;

pub mod dataset;
pub use dataset::{DataSet, UserLists};
pub mod encrypted;
mod error;
pub use error::{Error, ErrorKind, Result};
pub mod history;
pub use history::ValueSetHistory;
pub mod index;
pub use index::IdIndex;
pub mod item;
pub use item::{BaseRef, DataItem, FieldError, Identifiable, Record, ValidationErrors};
#[cfg(feature = "json")]
mod json;
pub mod keys;
pub mod list;
pub use list::{DataList, ItemEdit};
pub mod security;
pub use security::{SecurityError, SecurityProvider};
pub mod state;
pub use state::{DataState, EditState, ListStyle};
pub mod task;
pub use task::TaskControl;
pub mod values;
pub use values::{Decimal, Difference, FieldDef, FieldId, FieldKind, FieldValue, Value, ValueSet};

#[cfg(test)]
mod test_util;

/// Identifier of a record within its owning list.
///
/// `0` means "not yet allocated"; the list's [`IdIndex`] hands out real ids.
pub type RecordId = u32;

/// Map keyed by record id, used wherever records of two lists are matched up.
pub(crate) type IdMap<V> = HashMap<RecordId, V, RandomState>;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes hash-map iteration order inside the crate deterministic.
///
/// This should only be enabled for testing and benchmarking.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

pub(crate) fn create_id_map<V>(capacity: usize) -> IdMap<V> {
    HashMap::with_capacity_and_hasher(capacity, make_random_state())
}
