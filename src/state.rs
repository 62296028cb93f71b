// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Record and list lifecycle states.
//!
//! A record's [`DataState`] says what a backing store has to do with it (insert,
//! update, delete, nothing). It is never set directly: it is either computed from
//! the record's history by [`DataState::determine`], or moved along by one of the
//! transitions ([`DataState::deleted`], [`DataState::changed`],
//! [`DataState::recovered`]).
//!
//! [`EditState`] tracks validation and is orthogonal to `DataState`.
use crate::history::ValueSetHistory;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum DataState {
    #[default]
    NoState,
    /// Does not exist in the backing store yet.
    New,
    /// Matches the backing store.
    Clean,
    /// Exists in the backing store with different values.
    Changed,
    /// Exists in the backing store and is to be removed from it.
    Deleted,
    /// Was created and deleted again without ever being stored.
    DelNew,
    /// Was changed and then deleted.
    DelChg,
    /// Was deleted in the base and has been brought back.
    Recovered,
}

impl DataState {
    pub const ALL: [DataState; 8] = [
        DataState::NoState,
        DataState::New,
        DataState::Clean,
        DataState::Changed,
        DataState::Deleted,
        DataState::DelNew,
        DataState::DelChg,
        DataState::Recovered,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DataState::NoState => "NOSTATE",
            DataState::New => "NEW",
            DataState::Clean => "CLEAN",
            DataState::Changed => "CHANGED",
            DataState::Deleted => "DELETED",
            DataState::DelNew => "DELNEW",
            DataState::DelChg => "DELCHG",
            DataState::Recovered => "RECOVERED",
        }
    }

    pub const fn is_deletion(self) -> bool {
        matches!(
            self,
            DataState::Deleted | DataState::DelNew | DataState::DelChg
        )
    }

    /// Computes the state of a record from its history.
    ///
    /// `has_base` says whether the record is a view onto a record of another list.
    pub fn determine(style: ListStyle, has_base: bool, history: &ValueSetHistory) -> DataState {
        let current = history.current();
        let original = history.original();

        if style == ListStyle::Edit {
            if !history.has_history() {
                return match (current.is_deletion(), has_base) {
                    (false, true) => DataState::Clean,
                    (false, false) => DataState::New,
                    // a record derived from a deleted base carries the deletion along
                    (true, true) => DataState::Deleted,
                    (true, false) => DataState::DelNew,
                };
            }
            if current.is_deletion() {
                return if has_base {
                    DataState::Deleted
                } else {
                    DataState::DelNew
                };
            }
            if !has_base {
                return DataState::New;
            }
            if history.depth() == 1
                && original.is_deletion()
                && current.fields_differ(original).is_identical()
            {
                return DataState::Recovered;
            }
            return DataState::Changed;
        }

        if current.is_deletion() {
            return if original.version() != 0 {
                DataState::DelNew
            } else {
                DataState::Deleted
            };
        }
        if !history.has_history() {
            return if current.version() == 0 {
                DataState::Clean
            } else {
                DataState::New
            };
        }
        if original.version() == 0 {
            DataState::Changed
        } else {
            DataState::New
        }
    }

    /// The state after deleting a record in this state.
    pub const fn deleted(self) -> DataState {
        match self {
            DataState::New => DataState::DelNew,
            DataState::Changed => DataState::DelChg,
            DataState::Clean | DataState::Recovered | DataState::NoState => DataState::Deleted,
            DataState::Deleted | DataState::DelNew | DataState::DelChg => self,
        }
    }

    /// The state after changing a record in this state.
    pub const fn changed(self) -> DataState {
        match self {
            DataState::New | DataState::DelNew => DataState::New,
            _ => DataState::Changed,
        }
    }

    /// The state after recovering a record in this state, if that is allowed.
    pub const fn recovered(self) -> Option<DataState> {
        match self {
            DataState::Deleted | DataState::Clean => Some(DataState::Clean),
            DataState::DelNew => Some(DataState::New),
            DataState::DelChg => Some(DataState::Changed),
            _ => None,
        }
    }
}

impl fmt::Display for DataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Validation state of a record or list.
///
/// Ordered from best to worst; a list's edit state is the worst of its records'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum EditState {
    /// Nothing to save.
    #[default]
    Clean,
    /// Changed and validated.
    Valid,
    /// Changed, not validated yet.
    Dirty,
    /// Validation found problems.
    Error,
}

impl EditState {
    #[must_use]
    pub fn combine(self, other: EditState) -> EditState {
        self.max(other)
    }

    pub fn has_updates(self) -> bool {
        self != EditState::Clean
    }

    pub fn has_errors(self) -> bool {
        self == EditState::Error
    }
}

/// What kind of view a [`DataList`](crate::DataList) is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum ListStyle {
    /// The source of truth, mirroring the backing store.
    #[default]
    Core,
    /// A detached copy that becomes a new core list.
    Clone,
    /// A full copy that keeps states and history.
    Copy,
    /// A working copy for an edit session.
    Edit,
    /// Only the records that have something to save.
    Update,
    /// A read-only snapshot.
    View,
    /// The differences between two lists.
    Differ,
}

impl ListStyle {
    pub const fn name(self) -> &'static str {
        match self {
            ListStyle::Core => "CORE",
            ListStyle::Clone => "CLONE",
            ListStyle::Copy => "COPY",
            ListStyle::Edit => "EDIT",
            ListStyle::Update => "UPDATE",
            ListStyle::View => "VIEW",
            ListStyle::Differ => "DIFFER",
        }
    }
}

impl fmt::Display for ListStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValueSet;
    use std::fmt::Write;

    fn history(steps: &[(u32, bool)]) -> ValueSetHistory {
        let (first, rest) = steps.split_first().unwrap();
        let mut values = ValueSet::new(1);
        values.set(0, "x");
        values.set_version(first.0);
        values.set_deletion(first.1);
        let mut history = ValueSetHistory::new(values);
        for &(version, deleted) in rest {
            history.push_history(version);
            history.current_mut().set_deletion(deleted);
        }
        history
    }

    #[test]
    fn core_table() {
        let core = |steps: &[(u32, bool)]| DataState::determine(ListStyle::Core, false, &history(steps));
        assert_eq!(core(&[(0, false)]), DataState::Clean);
        assert_eq!(core(&[(3, false)]), DataState::New);
        assert_eq!(core(&[(0, false), (1, false)]), DataState::Changed);
        assert_eq!(core(&[(2, false), (3, false)]), DataState::New);
        assert_eq!(core(&[(0, false), (1, true)]), DataState::Deleted);
        assert_eq!(core(&[(2, false), (3, true)]), DataState::DelNew);
    }

    #[test]
    fn edit_table() {
        let edit = |has_base, steps: &[(u32, bool)]| {
            DataState::determine(ListStyle::Edit, has_base, &history(steps))
        };
        assert_eq!(edit(true, &[(0, false)]), DataState::Clean);
        assert_eq!(edit(false, &[(1, false)]), DataState::New);
        assert_eq!(edit(false, &[(1, false), (2, true)]), DataState::DelNew);
        assert_eq!(edit(true, &[(0, false), (1, true)]), DataState::Deleted);
        assert_eq!(edit(true, &[(0, true), (1, false)]), DataState::Recovered);
        assert_eq!(edit(true, &[(0, false), (1, false)]), DataState::Changed);
        assert_eq!(edit(false, &[(1, false), (2, false)]), DataState::New);
        // two steps away from the deleted base is a change, not a recovery
        assert_eq!(
            edit(true, &[(0, true), (1, false), (2, false)]),
            DataState::Changed
        );
    }

    #[test]
    fn recovery_needs_identical_fields() {
        let mut h = history(&[(0, true), (1, false)]);
        h.current_mut().set(0, "y");
        assert_eq!(
            DataState::determine(ListStyle::Edit, true, &h),
            DataState::Changed
        );
    }

    #[test]
    fn transition_table() {
        let mut out = String::new();
        for state in DataState::ALL {
            let recovered = state.recovered().map_or("-", DataState::name);
            writeln!(
                out,
                "{state:<9}: deleted={} changed={} recovered={recovered}",
                state.deleted(),
                state.changed(),
            )
            .unwrap();
        }
        insta::assert_snapshot!(out, @r"
        NOSTATE  : deleted=DELETED changed=CHANGED recovered=-
        NEW      : deleted=DELNEW changed=NEW recovered=-
        CLEAN    : deleted=DELETED changed=CHANGED recovered=CLEAN
        CHANGED  : deleted=DELCHG changed=CHANGED recovered=-
        DELETED  : deleted=DELETED changed=CHANGED recovered=CLEAN
        DELNEW   : deleted=DELNEW changed=NEW recovered=NEW
        DELCHG   : deleted=DELCHG changed=CHANGED recovered=CHANGED
        RECOVERED: deleted=DELETED changed=CHANGED recovered=-
        ");
    }

    #[test]
    fn edit_state_ordering() {
        assert_eq!(EditState::Clean.combine(EditState::Dirty), EditState::Dirty);
        assert_eq!(EditState::Error.combine(EditState::Valid), EditState::Error);
        assert!(EditState::Valid.has_updates());
        assert!(!EditState::Clean.has_updates());
    }
}
