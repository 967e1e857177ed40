use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::{to_fields, Collection};
use super::validate::Validator;
use crate::error::ApiError;
use crate::filter::{FilterSpec, SortDirection};
use crate::services::resources::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub expires_at: Option<NaiveDateTime>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub pinned: Option<bool>,
    pub expires_at: Option<String>,
}

pub type AnnouncementUpdate = NewAnnouncement;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<NaiveDateTime>,
}

impl Resource for Announcement {
    const COLLECTION: Collection = Collection::Announcements;
    const LABEL: &'static str = "Announcement";
    const FILTER: FilterSpec = FilterSpec {
        filters: &["priority", "pinned", "createdBy"],
        search_fields: &["title", "content"],
        sort_fields: None,
        default_order: ("createdAt", SortDirection::Desc),
    };

    type Create = NewAnnouncement;
    type Update = AnnouncementUpdate;

    fn prepare_create(input: NewAnnouncement) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.required("title", input.title);
        let content = v.required("content", input.content);
        let expires_at = v.datetime("expiresAt", input.expires_at.as_deref());
        v.finish()?;

        to_fields(&AnnouncementFields {
            title: Some(title),
            content: Some(content),
            priority: Some(input.priority.unwrap_or_default()),
            pinned: Some(input.pinned.unwrap_or(false)),
            expires_at,
        })
        .map_err(ApiError::upstream)
    }

    fn prepare_update(_current: &Announcement, input: AnnouncementUpdate) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.not_blank("title", input.title);
        let content = v.not_blank("content", input.content);
        let expires_at = v.datetime("expiresAt", input.expires_at.as_deref());
        v.finish()?;

        let fields = to_fields(&AnnouncementFields {
            title,
            content,
            priority: input.priority,
            pinned: input.pinned,
            expires_at,
        })
        .map_err(ApiError::upstream)?;

        if fields.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }
        Ok(fields)
    }
}
