//! Page fetching seam
//!
//! The engine only needs "give me page N for this query". `RestPageFetcher`
//! is the HTTP implementation; tests and other transports implement
//! `PageFetcher` directly.

mod rest;

pub use rest::RestPageFetcher;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::EntityRecord;

/// Identifies one issued fetch: the query generation and the page it was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub generation: u64,
    pub page: u32,
}

/// Snapshot of the server-side query a fetch was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub search_text: String,
    pub filters: BTreeMap<String, String>,
    /// 1-based page number
    pub page: u32,
    pub generation: u64,
    /// Records already received for this generation, for count-based `has_more`
    pub fetched_before: usize,
}

impl PageRequest {
    pub fn ticket(&self) -> FetchTicket {
        FetchTicket {
            generation: self.generation,
            page: self.page,
        }
    }
}

/// One batch of records plus the end-of-results signal
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<EntityRecord>,
    pub has_more: bool,
}

impl Page {
    pub fn new(records: Vec<EntityRecord>, has_more: bool) -> Self {
        Self { records, has_more }
    }

    /// The last page of a result set
    pub fn last(records: Vec<EntityRecord>) -> Self {
        Self::new(records, false)
    }

    /// Derive `has_more` from a total count reported by the backend
    pub fn from_total(records: Vec<EntityRecord>, fetched_before: usize, total: usize) -> Self {
        let has_more = !records.is_empty() && fetched_before + records.len() < total;
        Self { records, has_more }
    }
}

/// Loads one page of entities for a query snapshot.
///
/// Must not touch engine state; calling it again with the same request is a
/// plain retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page>;
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Arc<F> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        (**self).fetch_page(request).await
    }
}
