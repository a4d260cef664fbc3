//! End-to-end behaviour of a mounted list view against a scripted backend.
//!
//! All tests run on paused time, so debounce windows and slow fetches are
//! deterministic.

use async_trait::async_trait;
use livesync_core::{
    EntityId, EntityRecord, EventHub, EventSource, LiveListView, ListProfile, Page, PageFetcher,
    PageRequest, PushEvent, ScrollMetrics, SyncError, SyncState, ViewSnapshot,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[derive(Clone)]
struct Scripted {
    delay: Duration,
    outcome: Result<Page, String>,
}

/// Answers `(search, page)` from a script and records every request.
/// A key with several responses plays them in order and repeats the last.
#[derive(Default)]
struct ScriptedFetcher {
    script: Mutex<HashMap<(String, u32), VecDeque<Scripted>>>,
    calls: Mutex<Vec<PageRequest>>,
}

impl ScriptedFetcher {
    fn respond(&self, search: &str, page: u32, delay_ms: u64, outcome: Result<Page, String>) {
        self.script
            .lock()
            .unwrap()
            .entry((search.to_string(), page))
            .or_default()
            .push_back(Scripted {
                delay: Duration::from_millis(delay_ms),
                outcome,
            });
    }

    fn page(&self, search: &str, page: u32, delay_ms: u64, ids: &[i64], has_more: bool) {
        self.respond(search, page, delay_ms, Ok(page_of(ids, has_more)));
    }

    fn calls(&self) -> Vec<(String, u32)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.search_text.clone(), r.page))
            .collect()
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> anyhow::Result<Page> {
        self.calls.lock().unwrap().push(request.clone());
        let step = {
            let mut script = self.script.lock().unwrap();
            let queue = script.get_mut(&(request.search_text.clone(), request.page));
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let Some(step) = step else {
            return Ok(Page::last(Vec::new()));
        };
        sleep(step.delay).await;
        step.outcome.map_err(anyhow::Error::msg)
    }
}

fn record(id: i64) -> EntityRecord {
    EntityRecord::new(id, json!({ "name": format!("contact {}", id) }))
}

fn page_of(ids: &[i64], has_more: bool) -> Page {
    Page::new(ids.iter().map(|&id| record(id)).collect(), has_more)
}

fn profile(debounce_ms: u64) -> ListProfile {
    let mut profile = ListProfile::new("contacts", "contact");
    profile.search_debounce = Duration::from_millis(debounce_ms);
    profile
}

fn mount(
    profile: ListProfile,
    fetcher: &Arc<ScriptedFetcher>,
    hub: &EventHub,
) -> LiveListView {
    let fetcher: Arc<dyn PageFetcher> = fetcher.clone();
    LiveListView::spawn(profile, fetcher, hub)
}

async fn wait_for(
    view: &LiveListView,
    mut pred: impl FnMut(&ViewSnapshot) -> bool,
) -> ViewSnapshot {
    let mut rx = view.subscribe();
    timeout(Duration::from_secs(60), rx.wait_for(|s| pred(s)))
        .await
        .expect("timed out waiting for view state")
        .expect("view task ended")
        .clone()
}

fn loaded(s: &ViewSnapshot) -> bool {
    s.state == SyncState::Loaded
}

#[tokio::test(start_paused = true)]
async fn test_mount_loads_first_page() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 20, &[1, 2, 3], true);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    assert!(view.snapshot().is_loading());

    let snapshot = wait_for(&view, loaded).await;
    assert_eq!(snapshot.ids(), ["1", "2", "3"]);
    assert!(snapshot.has_more);
    assert_eq!(fetcher.calls(), [(String::new(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_search_is_debounced() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1, 2], false);
    fetcher.page("bia", 1, 0, &[7], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    wait_for(&view, loaded).await;

    view.search("b");
    view.search("bi");
    sleep(Duration::from_millis(300)).await;
    view.search("Bia");

    // Still inside the window: nothing issued yet
    sleep(Duration::from_millis(300)).await;
    assert_eq!(fetcher.calls().len(), 1);

    let snapshot = wait_for(&view, |s| s.search_text == "bia" && loaded(s)).await;
    assert_eq!(snapshot.ids(), ["7"]);
    assert_eq!(fetcher.calls(), [(String::new(), 1), ("bia".to_string(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_flushes_pending_search() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1], false);
    fetcher.page("ana", 1, 0, &[4], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    wait_for(&view, loaded).await;

    view.search("ana");
    view.set_filter("status", "open");

    wait_for(&view, |s| s.search_text == "ana" && loaded(s)).await;
    sleep(Duration::from_secs(1)).await;

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].search_text, "ana");
    assert_eq!(requests[1].filters.get("status").map(String::as_str), Some("open"));
}

#[tokio::test(start_paused = true)]
async fn test_stale_results_are_discarded() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1, 2], true);
    fetcher.page("alpha", 1, 200, &[10, 11], true);
    fetcher.page("beta", 1, 10, &[20], false);
    let hub = EventHub::new();

    let view = mount(profile(0), &fetcher, &hub);
    wait_for(&view, loaded).await;

    view.search("alpha");
    view.search("beta");

    let snapshot = wait_for(&view, |s| s.search_text == "beta" && loaded(s)).await;
    assert_eq!(snapshot.ids(), ["20"]);

    // Let the slow alpha fetch land
    sleep(Duration::from_millis(500)).await;
    let snapshot = view.snapshot();
    assert_eq!(snapshot.ids(), ["20"]);
    assert!(!snapshot.has_more);
    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_events_apply_while_loading() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 100, &[1, 2, 3], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    assert_eq!(hub.subscriber_count("contact"), 1);

    hub.publish("contact", PushEvent::Create(record(99)));
    let snapshot = wait_for(&view, |s| s.total_loaded == 1).await;
    assert!(snapshot.is_loading());

    let snapshot = wait_for(&view, loaded).await;
    assert_eq!(snapshot.ids(), ["99", "1", "2", "3"]);

    hub.publish("contact", PushEvent::Delete(EntityId::from(2i64)));
    hub.publish(
        "contact",
        PushEvent::Update(EntityRecord::new(3i64, json!({ "name": "renamed" }))),
    );
    // Other entity types never reach this view
    hub.publish("ticket", PushEvent::Delete(EntityId::from(1i64)));

    let snapshot = wait_for(&view, |s| s.total_loaded == 3).await;
    assert_eq!(snapshot.ids(), ["99", "1", "3"]);
    assert_eq!(snapshot.records[2].payload["name"], "renamed");
    assert_eq!(snapshot.state, SyncState::Loaded);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_loads_next_page_once() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1, 2], true);
    fetcher.page("", 2, 50, &[3, 4], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    wait_for(&view, loaded).await;

    // Far from the bottom
    view.scrolled(ScrollMetrics::new(0.0, 1000.0, 400.0));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(fetcher.calls().len(), 1);

    view.scrolled(ScrollMetrics::new(550.0, 1000.0, 400.0));
    view.scrolled(ScrollMetrics::new(560.0, 1000.0, 400.0));
    view.load_more();

    let snapshot = wait_for(&view, |s| s.total_loaded == 4 && loaded(s)).await;
    assert_eq!(snapshot.ids(), ["1", "2", "3", "4"]);
    assert!(!snapshot.has_more);
    assert_eq!(fetcher.calls(), [(String::new(), 1), (String::new(), 2)]);

    // End of results: further scrolling is inert
    view.scrolled(ScrollMetrics::new(0.0, 1000.0, 400.0));
    view.scrolled(ScrollMetrics::new(600.0, 1000.0, 400.0));
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_error_then_retry() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.respond("", 1, 0, Err("502 Bad Gateway".to_string()));
    fetcher.page("", 1, 0, &[1, 2], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    let snapshot = wait_for(&view, |s| s.state == SyncState::Error).await;
    assert!(snapshot.records.is_empty());
    assert!(matches!(
        snapshot.last_error,
        Some(SyncError::FetchFailed { page: 1, .. })
    ));

    view.retry();
    let snapshot = wait_for(&view, loaded).await;
    assert_eq!(snapshot.ids(), ["1", "2"]);
    assert!(snapshot.last_error.is_none());
    assert_eq!(fetcher.calls(), [(String::new(), 1), (String::new(), 1)]);
}

/// Panics on its first call, then serves a single page
#[derive(Default)]
struct CrashOnceFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CrashOnceFetcher {
    async fn fetch_page(&self, _request: &PageRequest) -> anyhow::Result<Page> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("backend client crashed");
        }
        Ok(page_of(&[1, 2], false))
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicked_fetch_can_be_retried() {
    let fetcher = Arc::new(CrashOnceFetcher::default());
    let hub = EventHub::new();

    let fetcher_dyn: Arc<dyn PageFetcher> = fetcher.clone();
    let view = LiveListView::spawn(profile(500), fetcher_dyn, &hub);

    let snapshot = wait_for(&view, |s| s.state == SyncState::Error).await;
    assert!(snapshot.records.is_empty());
    assert!(matches!(
        snapshot.last_error,
        Some(SyncError::FetchFailed { page: 1, .. })
    ));

    view.retry();
    let snapshot = wait_for(&view, loaded).await;
    assert_eq!(snapshot.ids(), ["1", "2"]);
    assert!(snapshot.last_error.is_none());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_discards_fetch_in_flight() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    // The mount fetch is slow and would bring back the old rows
    fetcher.page("", 1, 200, &[1, 2], false);
    fetcher.page("", 1, 10, &[3], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    view.refresh();

    let snapshot = wait_for(&view, loaded).await;
    assert_eq!(snapshot.ids(), ["3"]);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(view.snapshot().ids(), ["3"]);
    assert_eq!(view.snapshot().state, SyncState::Loaded);
    assert_eq!(fetcher.calls(), [(String::new(), 1), (String::new(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_applies_pending_search() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1, 2], false);
    fetcher.page("ana", 1, 0, &[7], false);
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    wait_for(&view, loaded).await;

    // Refresh lands inside the debounce window
    view.search("ana");
    view.refresh();

    let snapshot = wait_for(&view, |s| s.search_text == "ana" && loaded(s)).await;
    assert_eq!(snapshot.ids(), ["7"]);

    // The debounce deadline was consumed by the refresh
    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        fetcher.calls(),
        [(String::new(), 1), ("ana".to_string(), 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_tag_filter_does_not_refetch() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.respond(
        "",
        1,
        0,
        Ok(Page::last(vec![
            record(1).with_tags(["vip"]),
            record(2),
            record(3).with_tags(["vip", "late"]),
        ])),
    );
    let hub = EventHub::new();

    let view = mount(profile(500), &fetcher, &hub);
    wait_for(&view, loaded).await;

    view.set_tags(["vip"]);
    let snapshot = wait_for(&view, |s| !s.filter_tags.is_empty()).await;
    assert_eq!(snapshot.ids(), ["1", "3"]);
    assert_eq!(snapshot.total_loaded, 3);

    view.set_tags(Vec::<String>::new());
    let snapshot = wait_for(&view, |s| s.filter_tags.is_empty()).await;
    assert_eq!(snapshot.records.len(), 3);
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_unsubscribes() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1], false);
    let hub = EventHub::new();

    let first = mount(profile(500), &fetcher, &hub);
    let second = mount(profile(500), &fetcher, &hub);
    assert_eq!(hub.subscriber_count("contact"), 2);

    first.close().await;
    assert_eq!(hub.subscriber_count("contact"), 1);
    assert_eq!(hub.publish("contact", PushEvent::Create(record(5))), 1);

    drop(second);
    timeout(Duration::from_secs(5), async {
        while hub.subscriber_count("contact") > 0 {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("dropped view kept its subscription");
}

#[tokio::test(start_paused = true)]
async fn test_arc_hub_as_event_source() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.page("", 1, 0, &[1], false);
    let hub = Arc::new(EventHub::new());
    let source: Arc<dyn EventSource> = hub.clone();

    let fetcher_dyn: Arc<dyn PageFetcher> = fetcher.clone();
    let view = LiveListView::spawn(profile(500), fetcher_dyn, &source);
    wait_for(&view, loaded).await;

    hub.publish("contact", PushEvent::Create(record(8)));
    let snapshot = wait_for(&view, |s| s.total_loaded == 2).await;
    assert_eq!(snapshot.ids(), ["8", "1"]);
}
