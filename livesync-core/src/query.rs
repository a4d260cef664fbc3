//! Query state: filter parameters plus the page cursor
//!
//! Search text and server filters are sent to the backend, so changing them
//! restarts pagination. Tag filters are applied client-side and only change
//! the projection.

use std::collections::{BTreeMap, BTreeSet};

use crate::fetcher::PageRequest;
use crate::record::TagId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// A user-driven change to the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryChange {
    Search(String),
    SetFilter { key: String, value: String },
    ClearFilter(String),
    Tags(BTreeSet<TagId>),
}

/// What a query change requires from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEffect {
    /// A server-side parameter changed; reset and load page 1
    Refetch,
    /// Only the client-side projection changed
    Reproject,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    search_text: String,
    filter_tags: BTreeSet<TagId>,
    server_filters: BTreeMap<String, String>,
    page_cursor: u32,
    has_more: bool,
    status: FetchStatus,
    /// Bumped on every reset; tags fetches so stale results can be told apart
    generation: u64,
    /// Records received from pages of this generation, duplicates included
    fetched: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            filter_tags: BTreeSet::new(),
            server_filters: BTreeMap::new(),
            page_cursor: 1,
            has_more: true,
            status: FetchStatus::Idle,
            generation: 0,
            fetched: 0,
        }
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a filter change. Never touches the cursor.
    ///
    /// Search text is lowercased before comparison, so retyping the same
    /// text in another case does not refetch.
    pub fn apply(&mut self, change: QueryChange) -> QueryEffect {
        match change {
            QueryChange::Search(text) => {
                let text = text.to_lowercase();
                if text == self.search_text {
                    return QueryEffect::Unchanged;
                }
                self.search_text = text;
                QueryEffect::Refetch
            }
            QueryChange::SetFilter { key, value } => {
                if self.server_filters.get(&key) == Some(&value) {
                    return QueryEffect::Unchanged;
                }
                self.server_filters.insert(key, value);
                QueryEffect::Refetch
            }
            QueryChange::ClearFilter(key) => match self.server_filters.remove(&key) {
                Some(_) => QueryEffect::Refetch,
                None => QueryEffect::Unchanged,
            },
            QueryChange::Tags(tags) => {
                if tags == self.filter_tags {
                    return QueryEffect::Unchanged;
                }
                self.filter_tags = tags;
                QueryEffect::Reproject
            }
        }
    }

    /// Back to page 1 under a new generation, status `Loading`
    pub(crate) fn restart(&mut self) {
        self.page_cursor = 1;
        self.has_more = true;
        self.fetched = 0;
        self.generation += 1;
        self.status = FetchStatus::Loading;
    }

    /// The cursor may only move when more results exist and nothing is loading
    pub fn can_advance(&self) -> bool {
        self.has_more && self.status == FetchStatus::Loaded
    }

    /// Move to the next page. Returns `false` and leaves state alone when
    /// `can_advance` does not hold.
    pub(crate) fn advance(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.page_cursor += 1;
        self.status = FetchStatus::Loading;
        true
    }

    pub(crate) fn page_loaded(&mut self, received: usize, has_more: bool) {
        self.fetched += received;
        self.has_more = has_more;
        self.status = FetchStatus::Loaded;
    }

    pub(crate) fn set_status(&mut self, status: FetchStatus) {
        self.status = status;
    }

    /// Snapshot of the server-side query for the current cursor
    pub fn request(&self) -> PageRequest {
        PageRequest {
            search_text: self.search_text.clone(),
            filters: self.server_filters.clone(),
            page: self.page_cursor,
            generation: self.generation,
            fetched_before: self.fetched,
        }
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn filter_tags(&self) -> &BTreeSet<TagId> {
        &self.filter_tags
    }

    pub fn server_filters(&self) -> &BTreeMap<String, String> {
        &self.server_filters
    }

    pub fn page_cursor(&self) -> u32 {
        self.page_cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
