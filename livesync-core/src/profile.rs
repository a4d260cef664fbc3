//! Per-screen configuration for the generic engine.
//!
//! Contacts, tickets, integrations and connections differ only in endpoint,
//! record shape, update placement and paging; all of it lives here.

use config::{ProfileSettings, Settings};
use std::time::Duration;

use crate::error::SyncError;
use crate::events::{EventDecoder, Reconciler, UpdatePlacement};
use crate::record::RecordShape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListProfile {
    pub name: String,
    /// Endpoint path relative to the backend base URL
    pub path: String,
    /// Push-event channel this screen listens on
    pub entity_type: String,
    pub records_field: Option<String>,
    pub shape: RecordShape,
    /// Key of the record object in a push event
    pub event_record_key: String,
    pub placement: UpdatePlacement,
    pub paginated: bool,
    /// Server-side filter keys this screen accepts; empty accepts any key
    pub server_filters: Vec<String>,
    pub search_debounce: Duration,
    pub scroll_threshold_px: u32,
}

impl ListProfile {
    /// Resolve a named profile from settings, falling back to the built-ins
    pub fn from_settings(name: &str, settings: &Settings) -> Result<Self, SyncError> {
        let profile = settings
            .profile(name)
            .ok_or_else(|| SyncError::Config(format!("unknown list profile `{}`", name)))?;
        Ok(Self::from_profile_settings(name, &profile, settings))
    }

    pub fn from_profile_settings(name: &str, profile: &ProfileSettings, settings: &Settings) -> Self {
        let placement = if profile.promote_on_update {
            UpdatePlacement::Promote
        } else {
            UpdatePlacement::Preserve
        };

        Self {
            name: name.to_string(),
            path: profile.path.clone(),
            entity_type: profile.entity_type.clone(),
            records_field: profile.records_field.clone(),
            shape: RecordShape {
                id_field: profile.id_field.clone(),
                tags_field: profile.tags_field.clone(),
            },
            event_record_key: profile
                .event_record_key
                .clone()
                .unwrap_or_else(|| profile.entity_type.clone()),
            placement,
            paginated: profile.paginated,
            server_filters: profile.server_filters.clone(),
            search_debounce: Duration::from_millis(
                profile.search_debounce_ms.unwrap_or(settings.search_debounce_ms),
            ),
            scroll_threshold_px: settings.scroll_threshold_px,
        }
    }

    /// A bare profile for an entity type, mostly useful in tests
    pub fn new(name: &str, entity_type: &str) -> Self {
        Self {
            name: name.to_string(),
            path: format!("/{}", name),
            entity_type: entity_type.to_string(),
            records_field: None,
            shape: RecordShape::default(),
            event_record_key: entity_type.to_string(),
            placement: UpdatePlacement::Preserve,
            paginated: true,
            server_filters: Vec::new(),
            search_debounce: Duration::from_millis(500),
            scroll_threshold_px: 100,
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.placement)
    }

    pub fn event_decoder(&self) -> EventDecoder {
        EventDecoder::new(self.event_record_key.clone(), self.shape.clone())
    }
}
