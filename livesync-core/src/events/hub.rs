use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

use super::PushEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Source of push events for one entity type.
///
/// Every subscriber gets its own stream; dropping the stream unsubscribes.
/// Subscribers never own the underlying channel.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, entity_type: &str) -> BoxStream<'static, PushEvent>;
}

/// Process-wide fan-out of push events, one broadcast channel per entity type.
///
/// The transport layer publishes decoded events here; each open list view
/// subscribes independently.
#[derive(Debug)]
pub struct EventHub {
    channels: Mutex<HashMap<String, broadcast::Sender<PushEvent>>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` bounds how far a slow subscriber may fall behind before
    /// it starts losing events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, entity_type: &str) -> broadcast::Sender<PushEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(entity_type.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Deliver an event to every current subscriber of `entity_type`.
    /// Returns how many subscribers received it.
    pub fn publish(&self, entity_type: &str, event: PushEvent) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(entity_type) else {
            trace!(entity_type, "No subscribers, dropping {} event", event.kind());
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self, entity_type: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(entity_type)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl EventSource for EventHub {
    fn subscribe(&self, entity_type: &str) -> BoxStream<'static, PushEvent> {
        let receiver = self.sender(entity_type).subscribe();
        let entity_type = entity_type.to_string();

        BroadcastStream::new(receiver)
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!(entity_type = %entity_type, missed, "Event subscriber lagged");
                        None
                    }
                };
                futures::future::ready(event)
            })
            .boxed()
    }
}

impl<S: EventSource + ?Sized> EventSource for std::sync::Arc<S> {
    fn subscribe(&self, entity_type: &str) -> BoxStream<'static, PushEvent> {
        (**self).subscribe(entity_type)
    }
}
