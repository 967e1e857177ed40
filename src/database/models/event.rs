use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::{to_fields, Collection};
use super::validate::{nullable, optional_text, Validator};
use crate::error::ApiError;
use crate::filter::{FilterSpec, SortDirection};
use crate::database::SetLimit;
use crate::services::resources::Resource;

/// Set field holding the identity ids of attendees.
pub const ATTENDEES_FIELD: &str = "attendees";
/// Capacity field read by the atomic RSVP update.
pub const MAX_ATTENDEES_FIELD: &str = "maxAttendees";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
    pub location: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub max_attendees: Option<u32>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.max_attendees
            .map(|max| self.attendees.len() >= max as usize)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub max_attendees: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    /// `null` or blank clears the end time
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<String>>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// `null` removes the cap
    #[serde(default, deserialize_with = "nullable")]
    pub max_attendees: Option<Option<i64>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDateTime>,
    // Some(None) writes null, clearing the field
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<Option<NaiveDateTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attendees: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attendees: Option<Vec<String>>,
}

fn check_capacity(v: &mut Validator, value: Option<i64>) -> Option<u32> {
    match value {
        Some(n) if n < 1 || n > u32::MAX as i64 => {
            v.error("maxAttendees", "maxAttendees must be a positive number");
            None
        }
        Some(n) => Some(n as u32),
        None => None,
    }
}

fn capacity_below_attendees(attendees: usize) -> String {
    format!("maxAttendees cannot be lower than the {} current attendees", attendees)
}

impl Resource for Event {
    const COLLECTION: Collection = Collection::Events;
    const LABEL: &'static str = "Event";
    const FILTER: FilterSpec = FilterSpec {
        filters: &["category", "location", "createdBy"],
        search_fields: &["title", "description", "location"],
        sort_fields: None,
        default_order: ("date", SortDirection::Asc),
    };

    type Create = NewEvent;
    type Update = EventUpdate;

    fn prepare_create(input: NewEvent) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.required("title", input.title);
        let description = v.required("description", input.description);
        let location = v.required("location", input.location);
        let date_raw = v.required("date", input.date);
        let date = if date_raw.is_empty() { None } else { v.datetime("date", Some(&date_raw)) };
        let end_date = v.datetime("endDate", input.end_date.as_deref().filter(|s| !s.trim().is_empty()));
        let max_attendees = check_capacity(&mut v, input.max_attendees);

        if let (Some(start), Some(end)) = (date, end_date) {
            if end < start {
                v.error("endDate", "End time cannot be before start time");
            }
        }
        v.finish()?;

        to_fields(&EventFields {
            title: Some(title),
            description: Some(description),
            date,
            end_date: end_date.map(Some),
            location: Some(location),
            category: optional_text(input.category),
            image_url: optional_text(input.image_url),
            max_attendees: max_attendees.map(Some),
            attendees: Some(Vec::new()),
        })
        .map_err(ApiError::upstream)
    }

    fn prepare_update(current: &Event, input: EventUpdate) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.not_blank("title", input.title);
        let description = v.not_blank("description", input.description);
        let location = v.not_blank("location", input.location);
        let date = v.datetime("date", input.date.as_deref());
        let end_date = input.end_date.map(|end| match end.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => v.datetime("endDate", Some(raw)),
        });
        let max_attendees = input.max_attendees.map(|max| max.and_then(|n| check_capacity(&mut v, Some(n))));

        // Cross-field checks run against the document as it will look after the merge
        let start = date.unwrap_or(current.date);
        if let Some(end) = end_date.unwrap_or(current.end_date) {
            if end < start {
                v.error("endDate", "End time cannot be before start time");
            }
        }
        if let Some(Some(max)) = max_attendees {
            if (max as usize) < current.attendees.len() {
                v.error("maxAttendees", capacity_below_attendees(current.attendees.len()));
            }
        }
        v.finish()?;

        let fields = to_fields(&EventFields {
            title,
            description,
            date,
            end_date,
            location,
            category: optional_text(input.category),
            image_url: optional_text(input.image_url),
            max_attendees,
            attendees: None,
        })
        .map_err(ApiError::upstream)?;

        if fields.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }
        Ok(fields)
    }

    /// A lowered cap must still hold when the write lands, not just when it was validated.
    fn merge_limit(patch: &Map<String, Value>) -> Option<SetLimit<'static>> {
        patch
            .get(MAX_ATTENDEES_FIELD)
            .and_then(Value::as_u64)
            .map(|max| SetLimit { field: ATTENDEES_FIELD, max })
    }

    fn limit_exceeded(members: usize) -> ApiError {
        let message = capacity_below_attendees(members);
        let mut fields = std::collections::HashMap::new();
        fields.insert(MAX_ATTENDEES_FIELD.to_string(), message.clone());
        ApiError::validation_fields(message, fields)
    }
}
