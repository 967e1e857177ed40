use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Collections held by the document store, one per resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Events,
    Documents,
    Gallery,
    Announcements,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::Documents => "documents",
            Collection::Gallery => "gallery",
            Collection::Announcements => "announcements",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as the document store holds it: metadata plus a free-form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoredDocument {
    pub fn new(created_by: impl Into<String>, fields: Map<String, Value>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Top-level field merge
    pub fn merge(&mut self, patch: Map<String, Value>, now: DateTime<Utc>) {
        for (key, value) in patch {
            self.fields.insert(key, value);
        }
        self.updated_at = now;
    }

    /// String members of an array field; missing or non-array fields read as empty.
    pub fn set_members(&self, field: &str) -> Vec<String> {
        self.fields
            .get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

/// Serialize a payload struct into the field map the store persists.
pub fn to_fields<T: Serialize>(payload: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
