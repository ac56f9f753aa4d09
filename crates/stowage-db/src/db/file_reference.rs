//! File reference repository: rows keyed by (storage, checksum).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};

use stowage_core::models::{FileLocation, FileReference};
use stowage_core::AppError;

use crate::traits::FileReferenceRepository;

const COLUMNS: &str = "checksum, algorithm, filename, mime_type, file_size, storage, url, \
                       pending_action_remaining, nearline_confirmed, stored_at";

/// Row type for the file_references table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileReferenceRow {
    pub checksum: String,
    pub algorithm: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub storage: String,
    pub url: String,
    pub pending_action_remaining: bool,
    pub nearline_confirmed: bool,
    pub stored_at: DateTime<Utc>,
}

impl FileReferenceRow {
    pub fn into_file_reference(self) -> FileReference {
        FileReference {
            checksum: self.checksum,
            algorithm: self.algorithm,
            filename: self.filename,
            mime_type: self.mime_type,
            file_size: self.file_size,
            location: FileLocation {
                storage: self.storage,
                url: self.url,
                pending_action_remaining: self.pending_action_remaining,
            },
            nearline_confirmed: self.nearline_confirmed,
            stored_at: self.stored_at,
        }
    }
}

/// Repository for the file_references table.
#[derive(Clone)]
pub struct PgFileReferenceRepository {
    pool: PgPool,
}

impl PgFileReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileReferenceRepository for PgFileReferenceRepository {
    #[tracing::instrument(skip(self, reference), fields(db.table = "file_references", checksum = %reference.checksum))]
    async fn save(&self, reference: FileReference) -> Result<FileReference, AppError> {
        let row: FileReferenceRow = sqlx::query_as::<Postgres, FileReferenceRow>(&format!(
            r#"
            INSERT INTO file_references
                (checksum, algorithm, filename, mime_type, file_size, storage, url,
                 pending_action_remaining, nearline_confirmed, stored_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (storage, checksum) DO UPDATE SET
                algorithm = EXCLUDED.algorithm,
                filename = EXCLUDED.filename,
                mime_type = EXCLUDED.mime_type,
                file_size = EXCLUDED.file_size,
                url = EXCLUDED.url,
                pending_action_remaining = EXCLUDED.pending_action_remaining,
                nearline_confirmed = EXCLUDED.nearline_confirmed
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&reference.checksum)
        .bind(&reference.algorithm)
        .bind(&reference.filename)
        .bind(&reference.mime_type)
        .bind(reference.file_size)
        .bind(&reference.location.storage)
        .bind(&reference.location.url)
        .bind(reference.location.pending_action_remaining)
        .bind(reference.nearline_confirmed)
        .bind(reference.stored_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_file_reference())
    }

    #[tracing::instrument(skip(self, checksums), fields(db.table = "file_references", count = checksums.len()))]
    async fn find_by_checksums(
        &self,
        checksums: &[String],
    ) -> Result<Vec<FileReference>, AppError> {
        if checksums.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<FileReferenceRow> = sqlx::query_as::<Postgres, FileReferenceRow>(&format!(
            "SELECT {} FROM file_references WHERE checksum = ANY($1)",
            COLUMNS
        ))
        .bind(checksums)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(FileReferenceRow::into_file_reference)
            .collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_references"))]
    async fn find_by_storage_and_checksum(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<Option<FileReference>, AppError> {
        let row: Option<FileReferenceRow> = sqlx::query_as::<Postgres, FileReferenceRow>(&format!(
            "SELECT {} FROM file_references WHERE storage = $1 AND checksum = $2",
            COLUMNS
        ))
        .bind(storage)
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileReferenceRow::into_file_reference))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_references"))]
    async fn confirm_nearline_unavailable(
        &self,
        storage: &str,
        checksum: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE file_references SET nearline_confirmed = TRUE WHERE storage = $1 AND checksum = $2",
        )
        .bind(storage)
        .bind(checksum)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_references"))]
    async fn set_pending_action_remaining(
        &self,
        storage: &str,
        checksum: &str,
        pending: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE file_references SET pending_action_remaining = $3 WHERE storage = $1 AND checksum = $2",
        )
        .bind(storage)
        .bind(checksum)
        .bind(pending)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_references"))]
    async fn delete(&self, storage: &str, checksum: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file_references WHERE storage = $1 AND checksum = $2")
            .bind(storage)
            .bind(checksum)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
