use tracing::debug;

use super::resources::{decode, not_found, parse_id, Resource};
use crate::database::models::event::{ATTENDEES_FIELD, MAX_ATTENDEES_FIELD};
use crate::database::models::Event;
use crate::database::{DocumentStore, SetAddition, SetUpdate};
use crate::error::ApiError;

pub const EVENT_FULL: &str = "Event has reached maximum attendees.";
pub const ALREADY_ATTENDING: &str = "You have already RSVP'd to this event";
pub const NOT_ATTENDING: &str = "You have not RSVP'd to this event";

/// Add the caller to the attendee set in one atomic store update.
pub async fn rsvp(store: &dyn DocumentStore, event_id: &str, identity_id: &str) -> Result<Event, ApiError> {
    let id = parse_id::<Event>(event_id)?;
    let addition = SetAddition {
        field: ATTENDEES_FIELD,
        member: identity_id,
        limit_field: Some(MAX_ATTENDEES_FIELD),
    };

    match store.add_to_set(Event::COLLECTION, id, addition).await? {
        SetUpdate::Applied(doc) => {
            debug!(event = %id, identity = %identity_id, "RSVP recorded");
            decode(doc)
        }
        SetUpdate::AlreadyMember => Err(ApiError::validation(ALREADY_ATTENDING)),
        SetUpdate::CapacityReached => Err(ApiError::validation(EVENT_FULL)),
        SetUpdate::NotFound => Err(not_found::<Event>()),
        SetUpdate::NotMember => Err(ApiError::validation(NOT_ATTENDING)),
    }
}

/// Remove the caller from the attendee set in one atomic store update.
pub async fn cancel(store: &dyn DocumentStore, event_id: &str, identity_id: &str) -> Result<Event, ApiError> {
    let id = parse_id::<Event>(event_id)?;

    match store.remove_from_set(Event::COLLECTION, id, ATTENDEES_FIELD, identity_id).await? {
        SetUpdate::Applied(doc) => {
            debug!(event = %id, identity = %identity_id, "RSVP cancelled");
            decode(doc)
        }
        SetUpdate::NotMember => Err(ApiError::validation(NOT_ATTENDING)),
        SetUpdate::NotFound => Err(not_found::<Event>()),
        SetUpdate::AlreadyMember | SetUpdate::CapacityReached => Err(ApiError::upstream("unexpected set-remove outcome")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    async fn event_with_cap(store: &MemoryStore, cap: u32) -> String {
        let fields = json!({
            "title": "BBQ", "description": "Grill", "date": "2025-01-01T18:00:00",
            "location": "Park", "maxAttendees": cap, "attendees": []
        });
        let doc = store
            .insert(Event::COLLECTION, "admin", fields.as_object().cloned().unwrap())
            .await
            .unwrap();
        doc.id.to_string()
    }

    #[tokio::test]
    async fn duplicate_rsvp_is_rejected_without_change() {
        let store = MemoryStore::new();
        let id = event_with_cap(&store, 5).await;
        rsvp(&store, &id, "r1").await.unwrap();

        let err = rsvp(&store, &id, "r1").await.unwrap_err();
        assert_eq!(err.message(), ALREADY_ATTENDING);
        let event: Event = crate::services::resources::get(&store, &id).await.unwrap();
        assert_eq!(event.attendees, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn capacity_frees_up_after_cancel() {
        let store = MemoryStore::new();
        let id = event_with_cap(&store, 2).await;
        rsvp(&store, &id, "r1").await.unwrap();
        rsvp(&store, &id, "r2").await.unwrap();

        let err = rsvp(&store, &id, "r3").await.unwrap_err();
        assert_eq!(err.message(), EVENT_FULL);

        cancel(&store, &id, "r1").await.unwrap();
        let event = rsvp(&store, &id, "r3").await.unwrap();
        assert_eq!(event.attendees.len(), 2);
        assert_eq!(rsvp(&store, &id, "r4").await.unwrap_err().message(), EVENT_FULL);
    }

    #[tokio::test]
    async fn cancel_without_rsvp_is_validation() {
        let store = MemoryStore::new();
        let id = event_with_cap(&store, 2).await;
        assert!(matches!(cancel(&store, &id, "r1").await, Err(ApiError::Validation { .. })));
        assert!(matches!(cancel(&store, "nope", "r1").await, Err(ApiError::NotFound(_))));
    }
}
