//! Client-side tag projection over the collection.
//!
//! Tag filters never reach the backend; they narrow what is presented and
//! leave the stored collection alone.

use std::collections::BTreeSet;

use crate::record::{EntityRecord, TagId};
use crate::store::CollectionStore;

/// Borrowed, read-only view of the records carrying every selected tag
#[derive(Debug, Clone, Copy)]
pub struct TagProjection<'a> {
    store: &'a CollectionStore,
    selected: &'a BTreeSet<TagId>,
}

impl<'a> TagProjection<'a> {
    pub fn new(store: &'a CollectionStore, selected: &'a BTreeSet<TagId>) -> Self {
        Self { store, selected }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a EntityRecord> + 'a {
        let selected = self.selected;
        self.store
            .iter()
            .filter(move |record| record.has_all_tags(selected))
    }

    pub fn len(&self) -> usize {
        if self.selected.is_empty() {
            return self.store.len();
        }
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<EntityRecord> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_leaves_store_untouched() {
        let mut store = CollectionStore::new();
        store.append_page(vec![
            EntityRecord::new(1i64, json!({})).with_tags(["A"]),
            EntityRecord::new(2i64, json!({})).with_tags(["A", "B"]),
        ]);

        let only_b: BTreeSet<TagId> = [TagId::from("B")].into();
        let projection = TagProjection::new(&store, &only_b);
        let visible: Vec<_> = projection.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(visible, ["2"]);
        assert_eq!(projection.len(), 1);
        assert_eq!(store.len(), 2);

        let none = BTreeSet::new();
        assert_eq!(TagProjection::new(&store, &none).len(), 2);
    }
}
