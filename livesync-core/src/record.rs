//! Entity records and their identifiers
//!
//! A record is an immutable value: updates replace the whole record under
//! the same id. Ids arrive as JSON numbers (contacts, tickets) or strings
//! (integration keys), so both decode into the same string-backed newtype.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::SyncError;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
        }
    }
}

/// Macro to define a string-backed id that also accepts numeric JSON
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Read an id out of a JSON scalar; objects, arrays and null are rejected
            pub fn from_json(value: &Value) -> Option<Self> {
                match value {
                    Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
                    Value::Number(n) => Some(Self(n.to_string())),
                    _ => None,
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                Self(n.to_string())
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                Self(n.to_string())
            }
        }
    };
}

define_id!(EntityId, "Stable identifier of a list entity");
define_id!(TagId, "Identifier of a classification tag used by client-side filters");

/// One item of a list view
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    /// Arbitrary structured fields as delivered by the backend
    pub payload: Value,
    /// Tags derived from the payload, used by the tag projection
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
}

impl EntityRecord {
    pub fn new(id: impl Into<EntityId>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<T: Into<TagId>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// A record passes a tag filter iff it carries every selected tag
    pub fn has_all_tags(&self, selected: &BTreeSet<TagId>) -> bool {
        selected.is_subset(&self.tags)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Where the id and tags live inside a raw backend object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordShape {
    pub id_field: String,
    pub tags_field: Option<String>,
}

impl Default for RecordShape {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            tags_field: None,
        }
    }
}

impl RecordShape {
    /// Build a record from a raw JSON object.
    ///
    /// Tags may be a list of scalars (`[1, "vip"]`) or a list of objects with
    /// an `id` field (`[{"id": 1, "name": "vip"}]`); anything else is ignored.
    pub fn decode(&self, value: Value) -> Result<EntityRecord, SyncError> {
        let id = value
            .get(&self.id_field)
            .and_then(EntityId::from_json)
            .ok_or_else(|| {
                SyncError::RecordDecode(format!("missing or invalid `{}` field", self.id_field))
            })?;

        let tags = match self.tags_field.as_deref().and_then(|f| value.get(f)) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => obj.get("id").and_then(TagId::from_json),
                    other => TagId::from_json(other),
                })
                .collect(),
            _ => BTreeSet::new(),
        };

        Ok(EntityRecord {
            id,
            payload: value,
            tags,
        })
    }
}
