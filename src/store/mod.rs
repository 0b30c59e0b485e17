use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("document store query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("documents must be JSON objects")]
    NotAnObject,
}

/// A record as stored, with its server-assigned identity and timestamp.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: Uuid,
    pub collection: String,
    pub record: Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only JSON document store.
///
/// `append` stamps each record with a server-side `createdAt`, overriding
/// any client-supplied value.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn append(&self, collection: &str, record: Value) -> Result<(), PersistenceError>;

    /// Newest first, optionally limited to records whose `communityId` matches.
    async fn recent(
        &self,
        collection: &str,
        community_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<StoredDocument>, PersistenceError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    collection: String,
    record: Json<Value>,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            collection: row.collection,
            record: row.record.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn append(&self, collection: &str, record: Value) -> Result<(), PersistenceError> {
        if !record.is_object() {
            return Err(PersistenceError::NotAnObject);
        }

        // `||` keeps the right-hand key, so the database clock wins.
        sqlx::query(
            r#"
            INSERT INTO documents (collection, record, created_at)
            SELECT $1, $2::jsonb || jsonb_build_object('createdAt', ts), ts
            FROM (SELECT now() AS ts) AS clock
            "#,
        )
        .bind(collection)
        .bind(Json(&record))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(
        &self,
        collection: &str,
        community_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<StoredDocument>, PersistenceError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, collection, record, created_at
            FROM documents
            WHERE collection = $1
              AND ($2::text IS NULL OR record->>'communityId' = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(community_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
