//! SyncController - the transition function of one list view
//!
//! Owns the collection and the query state. Every input (query change,
//! scroll trigger, fetch result, push event) is a synchronous method call
//! that mutates state and, where a fetch is needed, hands back the
//! `PageRequest` to issue. The controller never performs I/O itself; the
//! async driver in `view` does.

use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, trace, warn};

use crate::error::SyncError;
use crate::events::{PushEvent, ReconcileOutcome, Reconciler};
use crate::fetcher::{FetchTicket, Page, PageRequest};
use crate::profile::ListProfile;
use crate::projection::TagProjection;
use crate::query::{FetchStatus, QueryChange, QueryEffect, QueryState};
use crate::record::{EntityRecord, TagId};
use crate::store::CollectionStore;


/// Fetch state machine: `Idle -> Loading(page) -> Loaded | Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading { page: u32 },
    Loaded,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Loading { page } => write!(f, "loading page {}", page),
            SyncState::Loaded => write!(f, "loaded"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

/// What happened to a fetch result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Merged into the collection
    Applied { inserted: usize },
    /// The fetch failed; the collection is unchanged
    Failed(SyncError),
    /// Issued for an older query or page; dropped without effect
    Stale,
}

/// Everything the presentation layer reads
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    /// Records after the tag projection, in collection order
    pub records: Vec<EntityRecord>,
    /// Records held by the collection before projection
    pub total_loaded: usize,
    pub state: SyncState,
    pub has_more: bool,
    pub search_text: String,
    pub filter_tags: BTreeSet<TagId>,
    pub last_error: Option<SyncError>,
}

impl Default for ViewSnapshot {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            total_loaded: 0,
            state: SyncState::Idle,
            has_more: true,
            search_text: String::new(),
            filter_tags: BTreeSet::new(),
            last_error: None,
        }
    }
}

impl ViewSnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.state, SyncState::Loading { .. })
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SyncController {
    store: CollectionStore,
    query: QueryState,
    reconciler: Reconciler,
    paginated: bool,
    accepted_filters: Vec<String>,
    last_error: Option<SyncError>,
}

impl SyncController {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            store: CollectionStore::new(),
            query: QueryState::new(),
            reconciler,
            paginated: true,
            accepted_filters: Vec::new(),
            last_error: None,
        }
    }

    pub fn for_profile(profile: &ListProfile) -> Self {
        Self {
            paginated: profile.paginated,
            accepted_filters: profile.server_filters.clone(),
            ..Self::new(profile.reconciler())
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Mount: empty collection, load page 1
    pub fn start(&mut self) -> PageRequest {
        self.restart()
    }

    /// Full reload under the current query
    pub fn refresh(&mut self) -> PageRequest {
        self.restart()
    }

    /// Apply a filter or search change. Server-side changes reset the
    /// collection and return the page-1 request; tag changes only affect the
    /// projection.
    pub fn change_query(&mut self, change: QueryChange) -> Option<PageRequest> {
        if let QueryChange::SetFilter { key, .. } | QueryChange::ClearFilter(key) = &change {
            if !self.accepts_filter(key) {
                warn!(key = %key, "Ignoring filter this list does not support");
                return None;
            }
        }

        match self.query.apply(change) {
            QueryEffect::Refetch => Some(self.restart()),
            QueryEffect::Reproject => {
                debug!(tags = self.query.filter_tags().len(), "Tag filter changed");
                None
            }
            QueryEffect::Unchanged => None,
        }
    }

    fn accepts_filter(&self, key: &str) -> bool {
        self.accepted_filters.is_empty() || self.accepted_filters.iter().any(|k| k == key)
    }

    fn restart(&mut self) -> PageRequest {
        self.store.reset();
        self.query.restart();
        self.last_error = None;
        info!(
            generation = self.query.generation(),
            search = %self.query.search_text(),
            "Query reset, loading page 1"
        );
        self.query.request()
    }

    /// Scroll trigger: request the next page when loaded and more exist.
    /// While a page is loading this is a no-op.
    pub fn load_more(&mut self) -> Option<PageRequest> {
        if self.query.advance() {
            debug!(page = self.query.page_cursor(), "Loading next page");
            return Some(self.query.request());
        }
        trace!(state = %self.state(), has_more = self.query.has_more(), "Load more ignored");
        None
    }

    /// Re-issue the page that failed. An unmounted view starts instead.
    pub fn retry(&mut self) -> Option<PageRequest> {
        match self.query.status() {
            FetchStatus::Error => {
                self.query.set_status(FetchStatus::Loading);
                info!(page = self.query.page_cursor(), "Retrying page");
                Some(self.query.request())
            }
            FetchStatus::Idle => Some(self.start()),
            FetchStatus::Loading | FetchStatus::Loaded => None,
        }
    }

    /// True when `ticket` is the fetch the controller is waiting for
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.query.status() == FetchStatus::Loading
            && ticket.generation == self.query.generation()
            && ticket.page == self.query.page_cursor()
    }

    /// Feed back the outcome of a fetch
    pub fn resolve(&mut self, ticket: FetchTicket, result: anyhow::Result<Page>) -> Resolution {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                page = ticket.page,
                current_generation = self.query.generation(),
                "Discarding stale page result"
            );
            return Resolution::Stale;
        }

        match result {
            Ok(page) => {
                let received = page.records.len();
                let has_more = self.paginated && page.has_more;
                let inserted = self.store.append_page(page.records);
                self.query.page_loaded(received, has_more);
                self.last_error = None;
                info!(
                    page = ticket.page,
                    received,
                    inserted,
                    has_more,
                    "Page loaded"
                );
                Resolution::Applied { inserted }
            }
            Err(e) => {
                let err = SyncError::fetch_failed(ticket.page, &e);
                warn!(page = ticket.page, "Page load failed: {:#}", e);
                self.query.set_status(FetchStatus::Error);
                self.last_error = Some(err.clone());
                Resolution::Failed(err)
            }
        }
    }

    /// Apply a push event. Never changes fetch state, cursor or `has_more`.
    pub fn apply_event(&mut self, event: PushEvent) -> ReconcileOutcome {
        let kind = event.kind();
        let outcome = self.reconciler.apply(&mut self.store, event);
        trace!(%kind, ?outcome, "Push event applied");
        outcome
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn state(&self) -> SyncState {
        match self.query.status() {
            FetchStatus::Idle => SyncState::Idle,
            FetchStatus::Loading => SyncState::Loading {
                page: self.query.page_cursor(),
            },
            FetchStatus::Loaded => SyncState::Loaded,
            FetchStatus::Error => SyncState::Error,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn has_more(&self) -> bool {
        self.query.has_more()
    }

    pub fn page(&self) -> u32 {
        self.query.page_cursor()
    }

    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    /// The collection as presented, after the tag projection
    pub fn visible(&self) -> TagProjection<'_> {
        TagProjection::new(&self.store, self.query.filter_tags())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            records: self.visible().to_vec(),
            total_loaded: self.store.len(),
            state: self.state(),
            has_more: self.query.has_more(),
            search_text: self.query.search_text().to_string(),
            filter_tags: self.query.filter_tags().clone(),
            last_error: self.last_error.clone(),
        }
    }
}
