//! Live-synchronized, paginated entity lists.
//!
//! A list screen shows a collection fetched page by page from a REST backend
//! while push events (create, update, delete) keep it current. The pieces:
//!
//! - `store`: ordered, de-duplicated collection keyed by entity id
//! - `query`: search text, filters and the page cursor
//! - `fetcher`: the `PageFetcher` seam and its REST implementation
//! - `events`: push-event decoding, fan-out and reconciliation
//! - `controller`: the synchronous state machine tying these together
//! - `view`: the async driver that runs a controller for one mounted screen

pub mod controller;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod profile;
pub mod projection;
pub mod query;
pub mod record;
pub mod scroll;
pub mod store;
pub mod view;

pub use controller::{Resolution, SyncController, SyncState, ViewSnapshot};
pub use error::SyncError;
pub use events::{
    EventDecoder, EventHub, EventKind, EventSource, PushEvent, ReconcileOutcome, Reconciler,
    UpdatePlacement,
};
pub use fetcher::{FetchTicket, Page, PageFetcher, PageRequest, RestPageFetcher};
pub use profile::ListProfile;
pub use projection::TagProjection;
pub use query::{FetchStatus, QueryChange, QueryEffect, QueryState};
pub use record::{EntityId, EntityRecord, RecordShape, TagId};
pub use scroll::{ScrollMetrics, ScrollTrigger};
pub use store::{CollectionStore, Upsert};
pub use view::{LiveListView, ViewCommand};
