use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Collection, NewUser, StoredDocument, UserRecord, UserUpdate};
use crate::filter::{Filter, FilterError, Page};

/// Errors from the user and document stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Set-add request; `limit_field` names a numeric field on the same document capping the set size.
#[derive(Debug, Clone, Copy)]
pub struct SetAddition<'a> {
    pub field: &'a str,
    pub member: &'a str,
    pub limit_field: Option<&'a str>,
}

/// Outcome of an atomic set-membership update
#[derive(Debug, Clone, PartialEq)]
pub enum SetUpdate {
    Applied(StoredDocument),
    AlreadyMember,
    NotMember,
    CapacityReached,
    NotFound,
}

/// Merge precondition: the array `field` may hold at most `max` members when the patch lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetLimit<'a> {
    pub field: &'a str,
    pub max: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Applied(StoredDocument),
    /// Nothing written; `members` is the set size that failed the limit
    LimitExceeded { members: usize },
    NotFound,
}

/// Application user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert-if-absent. Concurrent callers for the same id all observe the same record.
    async fn get_or_create(&self, seed: NewUser) -> Result<UserRecord, StoreError>;

    /// Fails with `StoreError::Conflict` when a record already exists.
    async fn create(&self, seed: NewUser) -> Result<UserRecord, StoreError>;

    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<UserRecord>, StoreError>;

    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn list(&self, filter: &Filter) -> Result<Page<UserRecord>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Collection-oriented document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(
        &self,
        collection: Collection,
        created_by: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StoreError>;

    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<StoredDocument>, StoreError>;

    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Page<StoredDocument>, StoreError>;

    /// Top-level field merge. The optional limit is checked in the same atomic write.
    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
        limit: Option<SetLimit<'_>>,
    ) -> Result<MergeOutcome, StoreError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Atomic read-modify-write adding `member` to an array field.
    async fn add_to_set(
        &self,
        collection: Collection,
        id: Uuid,
        addition: SetAddition<'_>,
    ) -> Result<SetUpdate, StoreError>;

    /// Atomic read-modify-write removing `member` from an array field.
    async fn remove_from_set(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        member: &str,
    ) -> Result<SetUpdate, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
