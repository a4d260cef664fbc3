//! Application settings management

use crate::PathManager;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_scroll_threshold_px() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of the REST backend (e.g., "http://localhost:8080")
    pub base_url: Option<String>,
    /// Quiet period after the last search keystroke before a refetch
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Distance from the bottom (px) that counts as "near the end"
    #[serde(default = "default_scroll_threshold_px")]
    pub scroll_threshold_px: u32,
    /// Per-request timeout handed to the HTTP client
    pub request_timeout_secs: Option<u64>,
    /// List screen profiles keyed by name ("contacts", "tickets", ...)
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            search_debounce_ms: default_search_debounce_ms(),
            scroll_threshold_px: default_scroll_threshold_px(),
            request_timeout_secs: None,
            profiles: BTreeMap::new(),
        }
    }
}

/// How one list screen talks to the backend and the event stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileSettings {
    /// Endpoint path, joined onto `base_url`
    pub path: String,
    /// Push-event channel name (e.g., "contact")
    pub entity_type: String,
    /// Field holding the records array in a page response; `None` when the
    /// response body is the array itself
    pub records_field: Option<String>,
    /// Field holding the stable id on each record
    #[serde(default = "ProfileSettings::default_id_field")]
    pub id_field: String,
    /// Field holding classification tags used by the client-side projection
    pub tags_field: Option<String>,
    /// Key of the record object inside a push event; defaults to `entity_type`
    pub event_record_key: Option<String>,
    /// Move updated records to the top instead of replacing them in place
    #[serde(default)]
    pub promote_on_update: bool,
    /// Whether the endpoint pages at all
    #[serde(default = "default_true")]
    pub paginated: bool,
    /// Query parameters that are forwarded to the server as filters
    #[serde(default)]
    pub server_filters: Vec<String>,
    /// Overrides the global search debounce for this screen
    pub search_debounce_ms: Option<u64>,
}

impl ProfileSettings {
    fn default_id_field() -> String {
        "id".to_string()
    }

    fn new(path: &str, entity_type: &str) -> Self {
        Self {
            path: path.to_string(),
            entity_type: entity_type.to_string(),
            records_field: None,
            id_field: Self::default_id_field(),
            tags_field: None,
            event_record_key: None,
            promote_on_update: false,
            paginated: true,
            server_filters: Vec::new(),
            search_debounce_ms: None,
        }
    }

    /// Built-in profile for a known screen name
    pub fn builtin(name: &str) -> Option<Self> {
        let profile = match name {
            "contacts" => Self {
                records_field: Some("contacts".to_string()),
                tags_field: Some("tags".to_string()),
                ..Self::new("/contacts/", "contact")
            },
            "tickets" => Self {
                records_field: Some("tickets".to_string()),
                tags_field: Some("tags".to_string()),
                promote_on_update: true,
                server_filters: vec![
                    "status".to_string(),
                    "date".to_string(),
                    "queueIds".to_string(),
                ],
                ..Self::new("/tickets", "ticket")
            },
            "integrations" => Self {
                id_field: "key".to_string(),
                event_record_key: Some("integration".to_string()),
                paginated: false,
                ..Self::new("/integrations", "integrations")
            },
            "connections" => Self {
                paginated: false,
                ..Self::new("/whatsapp/", "whatsapp")
            },
            _ => return None,
        };
        Some(profile)
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        Self::from_toml(&content).unwrap_or_default()
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Backend base URL, with `LIVESYNC_BASE_URL` taking precedence
    pub fn resolved_base_url(&self) -> Option<String> {
        std::env::var(crate::BASE_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.base_url.clone())
    }

    /// Look up a profile, falling back to the built-in one of the same name
    pub fn profile(&self, name: &str) -> Option<ProfileSettings> {
        self.profiles
            .get(name)
            .cloned()
            .or_else(|| ProfileSettings::builtin(name))
    }

    /// Names of all configured and built-in profiles
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["contacts", "tickets", "integrations", "connections"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for name in self.profiles.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}
