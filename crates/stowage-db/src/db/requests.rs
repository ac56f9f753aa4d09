//! Pending request queue repositories.
//!
//! "Pending" means no recorded error cause: failed requests stay in their
//! table with the cause until external policy re-submits or drops them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use stowage_core::models::{FileCacheRequest, FileDeletionRequest, FileStorageRequest};
use stowage_core::AppError;

use crate::traits::RequestRepository;

/// Row type for the file_storage_requests table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct StorageRequestRow {
    pub id: Uuid,
    pub checksum: String,
    pub algorithm: String,
    pub filename: String,
    pub mime_type: String,
    pub origin_url: String,
    pub storage: Option<String>,
    pub subdirectory: Option<String>,
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StorageRequestRow {
    fn into_request(self) -> FileStorageRequest {
        FileStorageRequest {
            id: self.id,
            checksum: self.checksum,
            algorithm: self.algorithm,
            filename: self.filename,
            mime_type: self.mime_type,
            origin_url: self.origin_url,
            storage: self.storage,
            subdirectory: self.subdirectory,
            error_cause: self.error_cause,
            created_at: self.created_at,
        }
    }
}

/// Repository for the file_storage_requests table.
#[derive(Clone)]
pub struct PgStorageRequestRepository {
    pool: PgPool,
}

impl PgStorageRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository<FileStorageRequest> for PgStorageRequestRepository {
    #[tracing::instrument(skip(self, request), fields(db.table = "file_storage_requests", request.id = %request.id))]
    async fn save(&self, request: FileStorageRequest) -> Result<FileStorageRequest, AppError> {
        let row: StorageRequestRow = sqlx::query_as::<Postgres, StorageRequestRow>(
            r#"
            INSERT INTO file_storage_requests
                (id, checksum, algorithm, filename, mime_type, origin_url, storage,
                 subdirectory, error_cause, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, checksum, algorithm, filename, mime_type, origin_url, storage,
                      subdirectory, error_cause, created_at
            "#,
        )
        .bind(request.id)
        .bind(&request.checksum)
        .bind(&request.algorithm)
        .bind(&request.filename)
        .bind(&request.mime_type)
        .bind(&request.origin_url)
        .bind(&request.storage)
        .bind(&request.subdirectory)
        .bind(&request.error_cause)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_request())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_storage_requests"))]
    async fn find_pending(&self, limit: i64) -> Result<Vec<FileStorageRequest>, AppError> {
        let rows: Vec<StorageRequestRow> = sqlx::query_as::<Postgres, StorageRequestRow>(
            r#"
            SELECT id, checksum, algorithm, filename, mime_type, origin_url, storage,
                   subdirectory, error_cause, created_at
            FROM file_storage_requests
            WHERE error_cause IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StorageRequestRow::into_request).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_storage_requests", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file_storage_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, cause), fields(db.table = "file_storage_requests", db.record_id = %id))]
    async fn mark_error(&self, id: Uuid, cause: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE file_storage_requests SET error_cause = $2 WHERE id = $1")
            .bind(id)
            .bind(cause)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Row type for the file_deletion_requests table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct DeletionRequestRow {
    pub id: Uuid,
    pub checksum: String,
    pub storage: String,
    pub file_url: String,
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeletionRequestRow {
    fn into_request(self) -> FileDeletionRequest {
        FileDeletionRequest {
            id: self.id,
            checksum: self.checksum,
            storage: self.storage,
            file_url: self.file_url,
            error_cause: self.error_cause,
            created_at: self.created_at,
        }
    }
}

/// Repository for the file_deletion_requests table.
#[derive(Clone)]
pub struct PgDeletionRequestRepository {
    pool: PgPool,
}

impl PgDeletionRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository<FileDeletionRequest> for PgDeletionRequestRepository {
    #[tracing::instrument(skip(self, request), fields(db.table = "file_deletion_requests", request.id = %request.id))]
    async fn save(&self, request: FileDeletionRequest) -> Result<FileDeletionRequest, AppError> {
        let row: DeletionRequestRow = sqlx::query_as::<Postgres, DeletionRequestRow>(
            r#"
            INSERT INTO file_deletion_requests
                (id, checksum, storage, file_url, error_cause, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, checksum, storage, file_url, error_cause, created_at
            "#,
        )
        .bind(request.id)
        .bind(&request.checksum)
        .bind(&request.storage)
        .bind(&request.file_url)
        .bind(&request.error_cause)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_request())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_deletion_requests"))]
    async fn find_pending(&self, limit: i64) -> Result<Vec<FileDeletionRequest>, AppError> {
        let rows: Vec<DeletionRequestRow> = sqlx::query_as::<Postgres, DeletionRequestRow>(
            r#"
            SELECT id, checksum, storage, file_url, error_cause, created_at
            FROM file_deletion_requests
            WHERE error_cause IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DeletionRequestRow::into_request).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_deletion_requests", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file_deletion_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, cause), fields(db.table = "file_deletion_requests", db.record_id = %id))]
    async fn mark_error(&self, id: Uuid, cause: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE file_deletion_requests SET error_cause = $2 WHERE id = $1")
            .bind(id)
            .bind(cause)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Row type for the file_cache_requests table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct CacheRequestRow {
    pub id: Uuid,
    pub checksum: String,
    pub storage: String,
    pub file_url: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub destination_path: String,
    pub error_cause: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheRequestRow {
    fn into_request(self) -> FileCacheRequest {
        FileCacheRequest {
            id: self.id,
            checksum: self.checksum,
            storage: self.storage,
            file_url: self.file_url,
            filename: self.filename,
            mime_type: self.mime_type,
            file_size: self.file_size,
            destination_path: self.destination_path,
            error_cause: self.error_cause,
            created_at: self.created_at,
        }
    }
}

/// Repository for the file_cache_requests table.
#[derive(Clone)]
pub struct PgCacheRequestRepository {
    pool: PgPool,
}

impl PgCacheRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository<FileCacheRequest> for PgCacheRequestRepository {
    #[tracing::instrument(skip(self, request), fields(db.table = "file_cache_requests", request.id = %request.id))]
    async fn save(&self, request: FileCacheRequest) -> Result<FileCacheRequest, AppError> {
        let row: CacheRequestRow = sqlx::query_as::<Postgres, CacheRequestRow>(
            r#"
            INSERT INTO file_cache_requests
                (id, checksum, storage, file_url, filename, mime_type, file_size,
                 destination_path, error_cause, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, checksum, storage, file_url, filename, mime_type, file_size,
                      destination_path, error_cause, created_at
            "#,
        )
        .bind(request.id)
        .bind(&request.checksum)
        .bind(&request.storage)
        .bind(&request.file_url)
        .bind(&request.filename)
        .bind(&request.mime_type)
        .bind(request.file_size)
        .bind(&request.destination_path)
        .bind(&request.error_cause)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_request())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_cache_requests"))]
    async fn find_pending(&self, limit: i64) -> Result<Vec<FileCacheRequest>, AppError> {
        let rows: Vec<CacheRequestRow> = sqlx::query_as::<Postgres, CacheRequestRow>(
            r#"
            SELECT id, checksum, storage, file_url, filename, mime_type, file_size,
                   destination_path, error_cause, created_at
            FROM file_cache_requests
            WHERE error_cause IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CacheRequestRow::into_request).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_cache_requests", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file_cache_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, cause), fields(db.table = "file_cache_requests", db.record_id = %id))]
    async fn mark_error(&self, id: Uuid, cause: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE file_cache_requests SET error_cause = $2 WHERE id = $1")
            .bind(id)
            .bind(cause)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
