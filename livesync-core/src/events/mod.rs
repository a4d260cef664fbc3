//! Push events: typed create/update/delete notifications and how they are
//! applied to a collection.

mod hub;
mod reconciler;

pub use hub::{EventHub, EventSource};
pub use reconciler::{ReconcileOutcome, Reconciler, UpdatePlacement};

use serde_json::Value;
use std::fmt;

use crate::error::SyncError;
use crate::record::{EntityId, EntityRecord, RecordShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Create => write!(f, "create"),
            EventKind::Update => write!(f, "update"),
            EventKind::Delete => write!(f, "delete"),
        }
    }
}

/// An entity was created, updated or deleted elsewhere
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Create(EntityRecord),
    Update(EntityRecord),
    Delete(EntityId),
}

impl PushEvent {
    pub fn id(&self) -> &EntityId {
        match self {
            PushEvent::Create(record) | PushEvent::Update(record) => &record.id,
            PushEvent::Delete(id) => id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::Create(_) => EventKind::Create,
            PushEvent::Update(_) => EventKind::Update,
            PushEvent::Delete(_) => EventKind::Delete,
        }
    }
}

/// Decodes socket payloads of the form
/// `{"action": "update", "<key>": {...}}` and `{"action": "delete", "<key>Id": 5}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecoder {
    record_key: String,
    shape: RecordShape,
}

impl EventDecoder {
    pub fn new(record_key: impl Into<String>, shape: RecordShape) -> Self {
        Self {
            record_key: record_key.into(),
            shape,
        }
    }

    pub fn decode(&self, wire: &Value) -> Result<PushEvent, SyncError> {
        let action = wire
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::EventDecode("missing `action`".to_string()))?;

        match action {
            "create" | "update" => {
                let raw = wire.get(&self.record_key).cloned().ok_or_else(|| {
                    SyncError::EventDecode(format!("`{}` event without `{}`", action, self.record_key))
                })?;
                let record = self
                    .shape
                    .decode(raw)
                    .map_err(|e| SyncError::EventDecode(e.to_string()))?;
                Ok(if action == "create" {
                    PushEvent::Create(record)
                } else {
                    PushEvent::Update(record)
                })
            }
            "delete" => self.delete_id(wire).map(PushEvent::Delete),
            other => Err(SyncError::EventDecode(format!("unknown action `{}`", other))),
        }
    }

    fn delete_id(&self, wire: &Value) -> Result<EntityId, SyncError> {
        wire.get(format!("{}Id", self.record_key))
            .and_then(EntityId::from_json)
            .or_else(|| {
                wire.get(&self.record_key)
                    .and_then(|record| record.get(&self.shape.id_field))
                    .and_then(EntityId::from_json)
            })
            .or_else(|| wire.get("id").and_then(EntityId::from_json))
            .ok_or_else(|| SyncError::EventDecode("`delete` event without an id".to_string()))
    }
}
