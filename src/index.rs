// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Id to position lookup for [`DataList`](crate::DataList).
//!
//! Record ids are small, dense integers handed out in increasing order, so most
//! of the index is a plain growable vector indexed by id. Ids at or above
//! [`IdIndex::DENSE_IDS`] (as read from a backing store) go to a hash map, so a
//! single large id does not size the vector.
use crate::{IdMap, RecordId, create_id_map};

#[derive(Clone, Debug)]
pub struct IdIndex {
    slots: Vec<Option<usize>>,
    sparse: IdMap<usize>,
    len: usize,
    // lowest id allocate() may hand out; never moves backwards
    next_id: RecordId,
}

impl Default for IdIndex {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            sparse: create_id_map(0),
            len: 0,
            next_id: 0,
        }
    }
}

impl IdIndex {
    /// Ids below this live in the dense vector.
    pub const DENSE_IDS: RecordId = 1 << 16;
    /// The largest id a list accepts; backing stores keep ids as signed 32-bit
    /// integers.
    pub const MAX_ID: RecordId = i32::MAX as RecordId;

    pub fn new() -> Self {
        Self::default()
    }

    /// An empty index that continues allocating where `other` left off.
    pub fn continuing(other: &IdIndex) -> Self {
        Self {
            next_id: other.next_id,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The id [`IdIndex::allocate`] would return next.
    pub fn next_id(&self) -> RecordId {
        self.next_id.max(1)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: RecordId) -> Option<usize> {
        if id < Self::DENSE_IDS {
            self.slots.get(id as usize).copied().flatten()
        } else {
            self.sparse.get(&id).copied()
        }
    }

    /// Reserves a fresh id. Ids are never reused, even after removal.
    pub fn allocate(&mut self) -> RecordId {
        let id = self.next_id();
        self.next_id = id.saturating_add(1);
        id
    }

    /// Points `id` at `position`, returning the previous position.
    pub fn set(&mut self, id: RecordId, position: usize) -> Option<usize> {
        let previous = if id < Self::DENSE_IDS {
            let slot = id as usize;
            if slot >= self.slots.len() {
                self.slots.resize(slot + 1, None);
            }
            self.slots[slot].replace(position)
        } else {
            self.sparse.insert(id, position)
        };
        if previous.is_none() {
            self.len += 1;
        }
        self.next_id = self.next_id.max(id.saturating_add(1));
        previous
    }

    pub fn remove(&mut self, id: RecordId) -> Option<usize> {
        let previous = if id < Self::DENSE_IDS {
            self.slots.get_mut(id as usize)?.take()
        } else {
            self.sparse.remove(&id)
        };
        if previous.is_some() {
            self.len -= 1;
        }
        previous
    }

    /// Forgets every entry but keeps the allocation counter.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.sparse.clear();
        self.len = 0;
    }
}
