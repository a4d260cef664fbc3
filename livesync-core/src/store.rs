//! Ordered, deduplicated collection of entity records
//!
//! Paged loads append in page order; live events insert at the front. The
//! id index and the sequence always agree on membership, and no id appears
//! twice. All mutation goes through this type.

use std::collections::HashMap;

use crate::record::{EntityId, EntityRecord};

/// What an insert-or-replace did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Id was absent; the record now sits at index 0
    Inserted,
    /// Id was present; the record was replaced at its existing position
    Replaced,
    /// Id was present; the record was replaced and moved to index 0
    Promoted,
}

#[derive(Debug, Default, Clone)]
pub struct CollectionStore {
    records: Vec<EntityRecord>,
    index: HashMap<EntityId, usize>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Append a fetched page, skipping ids that are already present.
    ///
    /// A record that arrived through a live event before its page keeps the
    /// live value. Returns how many records were inserted.
    pub fn append_page(&mut self, page: impl IntoIterator<Item = EntityRecord>) -> usize {
        let mut inserted = 0;
        for record in page {
            if self.index.contains_key(&record.id) {
                continue;
            }
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
            inserted += 1;
        }
        inserted
    }

    /// Replace in place if present, otherwise insert at the front
    pub fn upsert_front(&mut self, record: EntityRecord) -> Upsert {
        if let Some(&pos) = self.index.get(&record.id) {
            self.records[pos] = record;
            return Upsert::Replaced;
        }
        self.insert_front(record);
        Upsert::Inserted
    }

    /// Replace and move to the front if present, otherwise insert at the front
    pub fn promote(&mut self, record: EntityRecord) -> Upsert {
        match self.index.get(&record.id).copied() {
            Some(0) => {
                self.records[0] = record;
                Upsert::Promoted
            }
            Some(pos) => {
                self.records.remove(pos);
                self.records.insert(0, record);
                self.reindex(0..=pos);
                Upsert::Promoted
            }
            None => {
                self.insert_front(record);
                Upsert::Inserted
            }
        }
    }

    /// Remove a record; absent ids are a no-op
    pub fn remove(&mut self, id: &EntityId) -> Option<EntityRecord> {
        let pos = self.index.remove(id)?;
        let removed = self.records.remove(pos);
        self.reindex(pos..self.records.len());
        Some(removed)
    }

    fn insert_front(&mut self, record: EntityRecord) {
        self.records.insert(0, record);
        self.reindex(0..self.records.len());
    }

    fn reindex(&mut self, range: impl IntoIterator<Item = usize>) {
        for pos in range {
            self.index.insert(self.records[pos].id.clone(), pos);
        }
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// Records in current order. Each call starts a fresh pass.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of a record in the current order
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.records.iter().map(|r| &r.id)
    }

    pub fn to_vec(&self) -> Vec<EntityRecord> {
        self.records.clone()
    }

    /// True when the index and the sequence agree exactly
    pub fn check_invariants(&self) -> bool {
        self.index.len() == self.records.len()
            && self
                .records
                .iter()
                .enumerate()
                .all(|(pos, r)| self.index.get(&r.id) == Some(&pos))
    }
}

impl<'a> IntoIterator for &'a CollectionStore {
    type Item = &'a EntityRecord;
    type IntoIter = std::slice::Iter<'a, EntityRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
