//! LiveListView - async driver for one mounted list screen
//!
//! Runs a `SyncController` on a background task. UI input arrives as
//! `ViewCommand`s, push events arrive from an `EventSource`, and page fetches
//! run as child tasks tracked by their ticket. Every state change
//! is published as a `ViewSnapshot` on a watch channel.

use anyhow::anyhow;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info};

use crate::controller::{Resolution, SyncController, ViewSnapshot};
use crate::events::{EventSource, PushEvent};
use crate::fetcher::{FetchTicket, Page, PageFetcher, PageRequest};
use crate::profile::ListProfile;
use crate::query::QueryChange;
use crate::record::TagId;
use crate::scroll::{ScrollMetrics, ScrollTrigger};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Debounced search input
    Search(String),
    SetFilter { key: String, value: String },
    ClearFilter(String),
    Tags(BTreeSet<TagId>),
    LoadMore,
    Scrolled(ScrollMetrics),
    Retry,
    Refresh,
}

/// Handle to a running list view. Dropping it stops the background task and
/// unsubscribes from push events.
pub struct LiveListView {
    cmd_tx: mpsc::UnboundedSender<ViewCommand>,
    snapshot_rx: watch::Receiver<ViewSnapshot>,
    #[allow(dead_code)]
    task_handle: JoinHandle<()>,
}

impl LiveListView {
    /// Mount a view: subscribe to the profile's events and load page 1.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        profile: ListProfile,
        fetcher: Arc<dyn PageFetcher>,
        events: &dyn EventSource,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut controller = SyncController::for_profile(&profile);
        let first_page = controller.start();
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let events = events.subscribe(&profile.entity_type);

        let task = ViewTask {
            trigger: ScrollTrigger::new(profile.scroll_threshold_px),
            debounce: profile.search_debounce,
            name: profile.name,
            controller,
            fetcher,
            fetches: JoinSet::new(),
            in_flight: HashMap::new(),
            pending_search: None,
            deadline: None,
            snapshot_tx,
        };
        let task_handle = tokio::spawn(task.run(first_page, cmd_rx, events));

        Self {
            cmd_tx,
            snapshot_rx,
            task_handle,
        }
    }

    pub fn send(&self, command: ViewCommand) {
        let _ = self.cmd_tx.send(command);
    }

    pub fn search(&self, text: impl Into<String>) {
        self.send(ViewCommand::Search(text.into()));
    }

    pub fn set_filter(&self, key: impl Into<String>, value: impl Into<String>) {
        self.send(ViewCommand::SetFilter {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn clear_filter(&self, key: impl Into<String>) {
        self.send(ViewCommand::ClearFilter(key.into()));
    }

    pub fn set_tags<T: Into<TagId>>(&self, tags: impl IntoIterator<Item = T>) {
        self.send(ViewCommand::Tags(tags.into_iter().map(Into::into).collect()));
    }

    pub fn load_more(&self) {
        self.send(ViewCommand::LoadMore);
    }

    pub fn scrolled(&self, metrics: ScrollMetrics) {
        self.send(ViewCommand::Scrolled(metrics));
    }

    pub fn retry(&self) {
        self.send(ViewCommand::Retry);
    }

    pub fn refresh(&self) {
        self.send(ViewCommand::Refresh);
    }

    /// Latest published state
    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Unmount and wait for the background task to finish
    pub async fn close(self) {
        let Self {
            cmd_tx,
            task_handle,
            ..
        } = self;
        drop(cmd_tx);
        if let Err(e) = task_handle.await {
            error!("List view task ended abnormally: {}", e);
        }
    }
}

// ============================================================================
// Background task
// ============================================================================

struct ViewTask {
    name: String,
    controller: SyncController,
    fetcher: Arc<dyn PageFetcher>,
    fetches: JoinSet<anyhow::Result<Page>>,
    /// Ticket of every fetch task still in `fetches`
    in_flight: HashMap<task::Id, FetchTicket>,
    trigger: ScrollTrigger,
    debounce: Duration,
    pending_search: Option<String>,
    deadline: Option<Instant>,
    snapshot_tx: watch::Sender<ViewSnapshot>,
}

impl ViewTask {
    async fn run(
        mut self,
        first_page: PageRequest,
        mut cmd_rx: mpsc::UnboundedReceiver<ViewCommand>,
        mut events: BoxStream<'static, PushEvent>,
    ) {
        info!(view = %self.name, "List view mounted");
        self.issue(first_page);

        let mut events_open = true;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd);
                }
                event = events.next(), if events_open => {
                    match event {
                        Some(event) => {
                            self.controller.apply_event(event);
                        }
                        None => {
                            debug!(view = %self.name, "Event stream closed");
                            events_open = false;
                        }
                    }
                }
                joined = self.fetches.join_next_with_id(), if !self.fetches.is_empty() => {
                    match joined {
                        Some(Ok((id, result))) => self.handle_completion(id, result),
                        Some(Err(e)) => {
                            error!(view = %self.name, "Fetch task failed: {}", e);
                            self.handle_completion(e.id(), Err(anyhow!("fetch task failed: {}", e)));
                        }
                        None => {}
                    }
                }
                _ = sleep_until(self.deadline.unwrap_or_else(Instant::now)), if self.deadline.is_some() => {
                    self.deadline = None;
                    if let Some(request) = self.flush_search() {
                        self.issue(request);
                    }
                }
            }
            self.publish();
        }

        // Results of in-flight fetches are no longer wanted
        self.fetches.shutdown().await;
        info!(view = %self.name, "List view unmounted");
    }

    fn handle_command(&mut self, cmd: ViewCommand) {
        let request = match cmd {
            ViewCommand::Search(text) => {
                self.pending_search = Some(text);
                if self.debounce.is_zero() {
                    self.flush_search()
                } else {
                    // Each keystroke pushes the deadline back
                    self.deadline = Some(Instant::now() + self.debounce);
                    None
                }
            }
            ViewCommand::SetFilter { key, value } => {
                self.change_after_search(QueryChange::SetFilter { key, value })
            }
            ViewCommand::ClearFilter(key) => {
                self.change_after_search(QueryChange::ClearFilter(key))
            }
            ViewCommand::Tags(tags) => self.controller.change_query(QueryChange::Tags(tags)),
            ViewCommand::LoadMore => self.controller.load_more(),
            ViewCommand::Scrolled(metrics) => {
                if self.trigger.observe(metrics) {
                    self.controller.load_more()
                } else {
                    None
                }
            }
            ViewCommand::Retry => self.controller.retry(),
            ViewCommand::Refresh => {
                self.flush_search();
                Some(self.controller.refresh())
            }
        };

        if let Some(request) = request {
            self.issue(request);
        }
    }

    /// Apply a pending search immediately, then `change`. Only the newest
    /// request needs to be issued.
    fn change_after_search(&mut self, change: QueryChange) -> Option<PageRequest> {
        let flushed = self.flush_search();
        self.controller.change_query(change).or(flushed)
    }

    fn flush_search(&mut self) -> Option<PageRequest> {
        self.deadline = None;
        let text = self.pending_search.take()?;
        self.controller.change_query(QueryChange::Search(text))
    }

    fn issue(&mut self, request: PageRequest) {
        if request.page == 1 {
            self.trigger.rearm();
        }
        debug!(
            view = %self.name,
            page = request.page,
            generation = request.generation,
            "Fetching page"
        );
        let ticket = request.ticket();
        let fetcher = Arc::clone(&self.fetcher);
        let handle = self
            .fetches
            .spawn(async move { fetcher.fetch_page(&request).await });
        self.in_flight.insert(handle.id(), ticket);
    }

    /// A panicked fetch resolves as a failure so the view can be retried
    fn handle_completion(&mut self, id: task::Id, result: anyhow::Result<Page>) {
        let Some(ticket) = self.in_flight.remove(&id) else {
            return;
        };
        if let Resolution::Applied { .. } = self.controller.resolve(ticket, result) {
            self.trigger.rearm();
        }
    }

    fn publish(&self) {
        let next = self.controller.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
