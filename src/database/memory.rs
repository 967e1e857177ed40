use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{DocumentStore, MergeOutcome, SetAddition, SetLimit, SetUpdate, StoreError, UserStore};
use crate::database::models::{Collection, NewUser, StoredDocument, UserRecord, UserUpdate};
use crate::filter::{Filter, Page};

/// In-process store for tests and local development.
///
/// Each operation holds the relevant lock for its whole read-modify-write, which gives the
/// same atomicity the Postgres implementation gets from single-statement updates.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    documents: Arc<RwLock<HashMap<Collection, HashMap<Uuid, StoredDocument>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_or_create(&self, seed: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        let record = users
            .entry(seed.id.clone())
            .or_insert_with(|| seed.into_record(Utc::now()));
        Ok(record.clone())
    }

    async fn create(&self, seed: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&seed.id) {
            return Err(StoreError::Conflict("Resident record already exists".to_string()));
        }
        let record = seed.into_record(Utc::now());
        users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(id).map(|record| {
            record.apply(update, Utc::now());
            record.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    async fn list(&self, filter: &Filter) -> Result<Page<UserRecord>, StoreError> {
        let users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        Ok(filter.apply(users)?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        created_by: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StoreError> {
        let document = StoredDocument::new(created_by, fields, Utc::now());
        self.documents
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .cloned())
    }

    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Page<StoredDocument>, StoreError> {
        let documents: Vec<StoredDocument> = self
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        Ok(filter.apply(documents)?)
    }

    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
        limit: Option<SetLimit<'_>>,
    ) -> Result<MergeOutcome, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) else {
            return Ok(MergeOutcome::NotFound);
        };

        if let Some(limit) = limit {
            let members = doc.set_members(limit.field).len();
            if members as u64 > limit.max {
                return Ok(MergeOutcome::LimitExceeded { members });
            }
        }

        doc.merge(patch, Utc::now());
        Ok(MergeOutcome::Applied(doc.clone()))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .documents
            .write()
            .await
            .get_mut(&collection)
            .map(|docs| docs.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        id: Uuid,
        addition: SetAddition<'_>,
    ) -> Result<SetUpdate, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) else {
            return Ok(SetUpdate::NotFound);
        };

        let mut members = doc.set_members(addition.field);
        if members.iter().any(|m| m == addition.member) {
            return Ok(SetUpdate::AlreadyMember);
        }
        if let Some(limit) = addition.limit_field.and_then(|f| doc.fields.get(f)).and_then(Value::as_u64) {
            if members.len() as u64 >= limit {
                return Ok(SetUpdate::CapacityReached);
            }
        }

        members.push(addition.member.to_string());
        let mut patch = Map::new();
        patch.insert(addition.field.to_string(), Value::from(members));
        doc.merge(patch, Utc::now());
        Ok(SetUpdate::Applied(doc.clone()))
    }

    async fn remove_from_set(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        member: &str,
    ) -> Result<SetUpdate, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) else {
            return Ok(SetUpdate::NotFound);
        };

        let mut members = doc.set_members(field);
        let before = members.len();
        members.retain(|m| m != member);
        if members.len() == before {
            return Ok(SetUpdate::NotMember);
        }

        let mut patch = Map::new();
        patch.insert(field.to_string(), Value::from(members));
        doc.merge(patch, Utc::now());
        Ok(SetUpdate::Applied(doc.clone()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
