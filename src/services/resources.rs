use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::session::AuthContext;
use crate::config::ApiConfig;
use crate::database::models::{Collection, StoredDocument};
use crate::database::{DocumentStore, MergeOutcome, SetLimit, StoreError};
use crate::error::ApiError;
use crate::filter::{Filter, FilterSpec, Page};

/// A document-backed resource type served by the generic controllers.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human name used in messages ("Event not found")
    const LABEL: &'static str;
    const FILTER: FilterSpec;

    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;

    /// Validate a create payload into the stored field map.
    fn prepare_create(input: Self::Create) -> Result<Map<String, Value>, ApiError>;

    /// Validate an update payload against the current document into a field patch.
    fn prepare_update(current: &Self, input: Self::Update) -> Result<Map<String, Value>, ApiError>;

    /// Set-size precondition the store re-checks when the patch is written.
    fn merge_limit(_patch: &Map<String, Value>) -> Option<SetLimit<'static>> {
        None
    }

    /// Error for a patch whose limit no longer holds at write time.
    fn limit_exceeded(members: usize) -> ApiError {
        ApiError::validation(format!("{} changed during the update ({} members)", Self::LABEL, members))
    }
}

pub fn parse_id<R: Resource>(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| not_found::<R>())
}

pub fn not_found<R: Resource>() -> ApiError {
    ApiError::not_found(format!("{} not found", R::LABEL))
}

pub fn decode<R: Resource>(doc: StoredDocument) -> Result<R, ApiError> {
    let id = doc.id;
    doc.into_typed().map_err(|e| {
        ApiError::from(StoreError::Corrupt { id: format!("{}/{}", R::COLLECTION, id), reason: e.to_string() })
    })
}

pub async fn list<R: Resource>(
    store: &dyn DocumentStore,
    params: &HashMap<String, String>,
    api: &ApiConfig,
) -> Result<Page<R>, ApiError> {
    let filter = Filter::from_params(params, &R::FILTER, api)?;
    store.list(R::COLLECTION, &filter).await?.try_map(decode::<R>)
}

pub async fn get<R: Resource>(store: &dyn DocumentStore, id: &str) -> Result<R, ApiError> {
    let id = parse_id::<R>(id)?;
    let doc = store.get(R::COLLECTION, id).await?.ok_or_else(not_found::<R>)?;
    decode(doc)
}

pub async fn create<R: Resource>(store: &dyn DocumentStore, ctx: &AuthContext, input: R::Create) -> Result<R, ApiError> {
    let fields = R::prepare_create(input)?;
    let doc = store.insert(R::COLLECTION, ctx.identity_id(), fields).await?;
    info!(collection = %R::COLLECTION, id = %doc.id, by = %ctx.identity_id(), "Created {}", R::LABEL);
    decode(doc)
}

pub async fn update<R: Resource>(store: &dyn DocumentStore, id: &str, input: R::Update) -> Result<R, ApiError> {
    let current: R = get(store, id).await?;
    let patch = R::prepare_update(&current, input)?;
    let id = parse_id::<R>(id)?;
    let limit = R::merge_limit(&patch);
    match store.merge(R::COLLECTION, id, patch, limit).await? {
        MergeOutcome::Applied(doc) => decode(doc),
        MergeOutcome::LimitExceeded { members } => Err(R::limit_exceeded(members)),
        MergeOutcome::NotFound => Err(not_found::<R>()),
    }
}

pub async fn delete<R: Resource>(store: &dyn DocumentStore, ctx: &AuthContext, id: &str) -> Result<(), ApiError> {
    let uuid = parse_id::<R>(id)?;
    if !store.delete(R::COLLECTION, uuid).await? {
        return Err(not_found::<R>());
    }
    info!(collection = %R::COLLECTION, id = %uuid, by = %ctx.identity_id(), "Deleted {}", R::LABEL);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Announcement, Event, NewAnnouncement, NewEvent, Role, UserRecord};
    use crate::auth::VerifiedIdentity;
    use crate::config::{AppConfig, Environment};
    use crate::database::MemoryStore;

    fn admin() -> AuthContext {
        AuthContext {
            identity: VerifiedIdentity {
                id: "admin-1".to_string(),
                email: "admin@example.com".to_string(),
                email_verified: true,
                display_name: None,
                phone: None,
                role_claim: None,
            },
            record: UserRecord {
                role: Role::Admin,
                ..crate::database::models::NewUser::resident("admin-1", "admin@example.com").into_record(chrono::Utc::now())
            },
        }
    }

    fn api() -> ApiConfig {
        AppConfig::for_environment(Environment::Development).api
    }

    fn event(title: &str, category: &str) -> NewEvent {
        NewEvent {
            title: Some(title.to_string()),
            description: Some("d".to_string()),
            date: Some("2025-06-01T10:00".to_string()),
            location: Some("Clubhouse".to_string()),
            category: Some(category.to_string()),
            ..NewEvent::default()
        }
    }

    #[tokio::test]
    async fn create_stamps_creator() {
        let store = MemoryStore::new();
        let created: Event = create(&store, &admin(), event("Yoga", "fitness")).await.unwrap();
        assert_eq!(created.created_by, "admin-1");

        let fetched: Event = get(&store, &created.id.to_string()).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn malformed_or_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = get::<Event>(&store, "not-a-uuid").await.unwrap_err();
        assert_eq!(err.message(), "Event not found");
        let err = get::<Announcement>(&store, &Uuid::new_v4().to_string()).await.unwrap_err();
        assert_eq!(err.message(), "Announcement not found");
    }

    #[tokio::test]
    async fn list_applies_declared_filters() {
        let store = MemoryStore::new();
        create::<Event>(&store, &admin(), event("Yoga", "fitness")).await.unwrap();
        create::<Event>(&store, &admin(), event("Quiz", "social")).await.unwrap();
        create::<Announcement>(
            &store,
            &admin(),
            NewAnnouncement { title: Some("Water".to_string()), content: Some("Off at 9".to_string()), ..Default::default() },
        )
        .await
        .unwrap();

        let params: HashMap<String, String> = [("category".to_string(), "social".to_string())].into();
        let page = list::<Event>(&store, &params, &api()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].title, "Quiz");
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let store = MemoryStore::new();
        let created: Event = create(&store, &admin(), event("Yoga", "fitness")).await.unwrap();
        delete::<Event>(&store, &admin(), &created.id.to_string()).await.unwrap();
        assert!(matches!(
            delete::<Event>(&store, &admin(), &created.id.to_string()).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
