// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Per-record undo history.
//!
//! A [`ValueSetHistory`] is a stack of [`ValueSet`] snapshots. The bottom snapshot is
//! the record's *original* state (as loaded, or as derived into a view); the top one
//! is the *current* working snapshot that edits write to. Everything in between is
//! undo history, one snapshot per list version at which the record was changed.
//!
//! ```text
//!   original            current
//!   [v0 "Bank"] [v1 "Bank A"] [v3 "Bank B"]
//! ```
//!
//! An edit starts by pushing a copy of the current snapshot tagged with the new
//! list version, and ends either by keeping it or, if nothing actually changed,
//! popping it again. Snapshots below the top are never written to.
use crate::values::{Difference, FieldId, ValueSet};
use smallvec::{SmallVec, smallvec};
use std::fmt;

#[derive(Clone)]
pub struct ValueSetHistory {
    // never empty: [0] is the original, the last element is current
    snapshots: SmallVec<[ValueSet; 2]>,
}

impl ValueSetHistory {
    pub fn new(initial: ValueSet) -> Self {
        Self {
            snapshots: smallvec![initial],
        }
    }

    pub fn current(&self) -> &ValueSet {
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// The working snapshot.
    pub fn current_mut(&mut self) -> &mut ValueSet {
        let top = self.snapshots.len() - 1;
        &mut self.snapshots[top]
    }

    pub fn original(&self) -> &ValueSet {
        &self.snapshots[0]
    }

    pub fn has_history(&self) -> bool {
        self.snapshots.len() > 1
    }

    /// Number of snapshots above the original.
    pub fn depth(&self) -> usize {
        self.snapshots.len() - 1
    }

    /// All snapshots, original first.
    pub fn snapshots(&self) -> impl Iterator<Item = &ValueSet> {
        self.snapshots.iter()
    }

    /// Starts a new working snapshot for `version`, copied from the current one.
    pub fn push_history(&mut self, version: u32) {
        let mut next = self.current().clone();
        next.set_version(version);
        self.snapshots.push(next);
    }

    /// Discards the working snapshot. Returns `false` if there was no history.
    pub fn pop_history(&mut self) -> bool {
        if !self.has_history() {
            return false;
        }
        self.snapshots.pop();
        true
    }

    /// Ends an edit: drops the working snapshot again if it equals the one below.
    ///
    /// Returns whether the edit changed anything. The version tags are not
    /// compared; the deletion flags are.
    pub fn maybe_pop_history(&mut self) -> bool {
        let len = self.snapshots.len();
        if len < 2 {
            return false;
        }
        if self.snapshots[len - 1]
            .differs(&self.snapshots[len - 2])
            .is_identical()
        {
            self.snapshots.pop();
            return false;
        }
        true
    }

    /// Undoes everything: current becomes the original again.
    pub fn reset_history(&mut self) {
        self.snapshots.truncate(1);
    }

    /// Forgets the history: current becomes the new original.
    pub fn clear_history(&mut self) {
        if self.has_history() {
            let len = self.snapshots.len();
            self.snapshots.swap(0, len - 1);
            self.snapshots.truncate(1);
        }
    }

    /// Replaces the history with `base` below the current snapshot.
    pub fn set_history(&mut self, base: &ValueSet) {
        self.clear_history();
        self.snapshots.insert(0, base.clone());
    }

    /// Compares `field` of the current snapshot against the original.
    pub fn field_changed(&self, field: FieldId) -> Difference {
        self.current().field_differs(self.original(), field)
    }

    /// Pops every snapshot created after `version`.
    ///
    /// The original is never popped; if it is itself newer than `version` the
    /// record as a whole postdates `version` and the caller is expected to drop it.
    /// Returns whether anything was popped.
    pub fn rewind_to_version(&mut self, version: u32) -> bool {
        let before = self.snapshots.len();
        while self.has_history() && self.current().version() > version {
            self.snapshots.pop();
        }
        before != self.snapshots.len()
    }
}

impl fmt::Debug for ValueSetHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshots.iter()).finish()
    }
}
