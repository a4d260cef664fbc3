use tracing::debug;

use super::PushEvent;
use crate::store::{CollectionStore, Upsert};

/// Where an `update` for a record that is already loaded ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePlacement {
    /// Replace in place; the list keeps its paginated order
    #[default]
    Preserve,
    /// Move the updated record to the top (attention-ordered lists)
    Promote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Replaced,
    Promoted,
    Removed,
    /// Delete for an id that is not loaded; absorbed silently
    Ignored,
}

impl From<Upsert> for ReconcileOutcome {
    fn from(upsert: Upsert) -> Self {
        match upsert {
            Upsert::Inserted => ReconcileOutcome::Inserted,
            Upsert::Replaced => ReconcileOutcome::Replaced,
            Upsert::Promoted => ReconcileOutcome::Promoted,
        }
    }
}

/// Applies push events to a collection, independent of pagination state.
///
/// Events for ids whose page has not been fetched yet are applied anyway:
/// the record shows up at the top right away and the later page skips it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    placement: UpdatePlacement,
}

impl Reconciler {
    pub fn new(placement: UpdatePlacement) -> Self {
        Self { placement }
    }

    pub fn placement(&self) -> UpdatePlacement {
        self.placement
    }

    pub fn apply(&self, store: &mut CollectionStore, event: PushEvent) -> ReconcileOutcome {
        match event {
            PushEvent::Create(record) => store.upsert_front(record).into(),
            PushEvent::Update(record) => match self.placement {
                UpdatePlacement::Preserve => store.upsert_front(record).into(),
                UpdatePlacement::Promote => store.promote(record).into(),
            },
            PushEvent::Delete(id) => match store.remove(&id) {
                Some(_) => ReconcileOutcome::Removed,
                None => {
                    debug!(id = %id, "Ignoring delete for record that is not loaded");
                    ReconcileOutcome::Ignored
                }
            },
        }
    }
}
