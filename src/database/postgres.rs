use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::store::{DocumentStore, MergeOutcome, SetAddition, SetLimit, SetUpdate, StoreError, UserStore};
use crate::config::DatabaseConfig;
use crate::database::models::{Collection, NewUser, PrivacySettings, StoredDocument, UserRecord, UserUpdate};
use crate::filter::{Filter, Page, Pagination, SqlTarget};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'resident',
        display_name TEXT,
        phone TEXT,
        unit TEXT,
        block TEXT,
        flat_number TEXT,
        privacy JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id UUID PRIMARY KEY,
        collection TEXT NOT NULL,
        created_by TEXT NOT NULL,
        data JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS documents_collection_created_idx ON documents (collection, created_at DESC)",
];

const USER_COLUMNS: &str =
    "id, email, role, display_name, phone, unit, block, flat_number, privacy, created_at, updated_at";
const DOCUMENT_COLUMNS: &str = "id, created_by, data, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    role: String,
    display_name: Option<String>,
    phone: Option<String>,
    unit: Option<String>,
    block: Option<String>,
    flat_number: Option<String>,
    privacy: Json<PrivacySettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|reason| StoreError::Corrupt { id: row.id.clone(), reason })?;
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            role,
            display_name: row.display_name,
            phone: row.phone,
            unit: row.unit,
            block: row.block,
            flat_number: row.flat_number,
            privacy: row.privacy.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    created_by: String,
    data: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        StoredDocument {
            id: row.id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            fields: row.data.0,
        }
    }
}

/// Postgres-backed user and document store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;
        info!("Connected database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn fetch_document(&self, collection: Collection, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        let sql = format!("SELECT {} FROM documents WHERE collection = $1 AND id = $2", DOCUMENT_COLUMNS);
        Ok(sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredDocument::from))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user(id).await
    }

    async fn get_or_create(&self, seed: NewUser) -> Result<UserRecord, StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, role, display_name, phone, unit, block, flat_number, privacy)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&seed.id)
        .bind(&seed.email)
        .bind(seed.role.as_str())
        .bind(&seed.display_name)
        .bind(&seed.phone)
        .bind(&seed.unit)
        .bind(&seed.block)
        .bind(&seed.flat_number)
        .bind(Json(PrivacySettings::default()))
        .execute(&self.pool)
        .await?;

        // Whoever won the insert, the stored row is the answer
        self.fetch_user(&seed.id)
            .await?
            .ok_or_else(|| StoreError::QueryError(format!("user {} vanished after insert", seed.id)))
    }

    async fn create(&self, seed: NewUser) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, role, display_name, phone, unit, block, flat_number, privacy)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&seed.id)
            .bind(&seed.email)
            .bind(seed.role.as_str())
            .bind(&seed.display_name)
            .bind(&seed.phone)
            .bind(&seed.unit)
            .bind(&seed.block)
            .bind(&seed.flat_number)
            .bind(Json(PrivacySettings::default()))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::Conflict("Resident record already exists".to_string())),
        }
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            "UPDATE users SET
                display_name = COALESCE($2, display_name),
                phone = COALESCE($3, phone),
                privacy = COALESCE($4, privacy),
                role = COALESCE($5, role),
                unit = COALESCE($6, unit),
                block = COALESCE($7, block),
                flat_number = COALESCE($8, flat_number),
                updated_at = now()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.display_name)
            .bind(&update.phone)
            .bind(update.privacy.map(Json))
            .bind(update.role.map(|r| r.as_str()))
            .bind(&update.unit)
            .bind(&update.block)
            .bind(&update.flat_number)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &Filter) -> Result<Page<UserRecord>, StoreError> {
        let where_sql = filter.to_where_sql(SqlTarget::Users, 0)?;

        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", where_sql.query);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in &where_sql.params {
            count = count.bind(p.as_str());
        }
        let total = count.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT {} FROM users WHERE {} {}",
            USER_COLUMNS,
            where_sql.query,
            filter.to_window_sql(SqlTarget::Users)?
        );
        let mut select = sqlx::query_as::<_, UserRow>(&select_sql);
        for p in &where_sql.params {
            select = select.bind(p.as_str());
        }
        let items = select
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(UserRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, pagination: Pagination::new(filter.page(), filter.page_size(), total as u64) })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(
        &self,
        collection: Collection,
        created_by: &str,
        fields: Map<String, Value>,
    ) -> Result<StoredDocument, StoreError> {
        let sql = format!(
            "INSERT INTO documents (id, collection, created_by, data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, now(), now())
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(collection.as_str())
            .bind(created_by)
            .bind(Json(fields))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        self.fetch_document(collection, id).await
    }

    async fn list(&self, collection: Collection, filter: &Filter) -> Result<Page<StoredDocument>, StoreError> {
        // $1 is the collection, filter parameters follow
        let where_sql = filter.to_where_sql(SqlTarget::Documents, 1)?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND {}",
            where_sql.query
        );
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(collection.as_str());
        for p in &where_sql.params {
            count = count.bind(p.as_str());
        }
        let total = count.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT {} FROM documents WHERE collection = $1 AND {} {}",
            DOCUMENT_COLUMNS,
            where_sql.query,
            filter.to_window_sql(SqlTarget::Documents)?
        );
        let mut select = sqlx::query_as::<_, DocumentRow>(&select_sql).bind(collection.as_str());
        for p in &where_sql.params {
            select = select.bind(p.as_str());
        }
        let items = select
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(StoredDocument::from)
            .collect();

        Ok(Page { items, pagination: Pagination::new(filter.page(), filter.page_size(), total as u64) })
    }

    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
        limit: Option<SetLimit<'_>>,
    ) -> Result<MergeOutcome, StoreError> {
        // The limit is part of the WHERE clause, so a concurrent set-add cannot slip in between
        let sql = format!(
            "UPDATE documents SET data = data || $3, updated_at = now()
             WHERE collection = $1 AND id = $2
               AND (
                    $4::text IS NULL
                    OR jsonb_array_length(COALESCE(data->$4::text, '[]'::jsonb)) <= $5::bigint
               )
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(collection.as_str())
            .bind(id)
            .bind(Json(patch))
            .bind(limit.map(|l| l.field))
            .bind(limit.map(|l| l.max.min(i64::MAX as u64) as i64))
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(MergeOutcome::Applied(row.into()));
        }

        match (self.fetch_document(collection, id).await?, limit) {
            (Some(doc), Some(limit)) => Ok(MergeOutcome::LimitExceeded { members: doc.set_members(limit.field).len() }),
            // Deleted between the UPDATE and this read, or never existed
            _ => Ok(MergeOutcome::NotFound),
        }
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        id: Uuid,
        addition: SetAddition<'_>,
    ) -> Result<SetUpdate, StoreError> {
        // Membership and capacity are checked inside the UPDATE so concurrent callers serialize on the row
        let sql = format!(
            "UPDATE documents
             SET data = jsonb_set(data, ARRAY[$3::text], COALESCE(data->$3, '[]'::jsonb) || to_jsonb($4::text)),
                 updated_at = now()
             WHERE collection = $1 AND id = $2
               AND NOT (COALESCE(data->$3, '[]'::jsonb) ? $4)
               AND (
                    $5::text IS NULL
                    OR jsonb_typeof(data->$5) IS DISTINCT FROM 'number'
                    OR jsonb_array_length(COALESCE(data->$3, '[]'::jsonb)) < (data->>$5)::numeric
               )
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(collection.as_str())
            .bind(id)
            .bind(addition.field)
            .bind(addition.member)
            .bind(addition.limit_field)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(SetUpdate::Applied(row.into()));
        }

        // Nothing changed: classify from the current row
        let Some(doc) = self.fetch_document(collection, id).await? else {
            return Ok(SetUpdate::NotFound);
        };
        if doc.set_members(addition.field).iter().any(|m| m == addition.member) {
            Ok(SetUpdate::AlreadyMember)
        } else {
            Ok(SetUpdate::CapacityReached)
        }
    }

    async fn remove_from_set(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        member: &str,
    ) -> Result<SetUpdate, StoreError> {
        let sql = format!(
            "UPDATE documents
             SET data = jsonb_set(data, ARRAY[$3::text], (data->$3) - $4::text),
                 updated_at = now()
             WHERE collection = $1 AND id = $2
               AND COALESCE(data->$3, '[]'::jsonb) ? $4
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(collection.as_str())
            .bind(id)
            .bind(field)
            .bind(member)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(SetUpdate::Applied(row.into())),
            None => match self.fetch_document(collection, id).await? {
                Some(_) => Ok(SetUpdate::NotMember),
                None => Ok(SetUpdate::NotFound),
            },
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        UserStore::health_check(self).await
    }
}
