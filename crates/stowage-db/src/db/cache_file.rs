//! Cache ledger repository: rows keyed by checksum.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};

use stowage_core::models::{CacheFile, CacheLocation};
use stowage_core::AppError;

use crate::traits::CacheFileRepository;

const COLUMNS: &str =
    "checksum, filename, mime_type, file_size, kind, path, storage, groups, expiration_date";

/// Row type for the cache_files table (for FromRow).
///
/// The `CacheLocation` variant is decomposed into a `kind` discriminator plus
/// nullable `path`/`storage` columns.
#[derive(Debug, sqlx::FromRow)]
pub struct CacheFileRow {
    pub checksum: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub kind: String,
    pub path: Option<String>,
    pub storage: Option<String>,
    pub groups: Vec<String>,
    pub expiration_date: DateTime<Utc>,
}

impl CacheFileRow {
    pub fn into_cache_file(self) -> CacheFile {
        let location = match self.kind.as_str() {
            "internal" => CacheLocation::Internal {
                path: self.path.unwrap_or_default(),
            },
            _ => CacheLocation::External {
                storage: self.storage.unwrap_or_default(),
            },
        };
        CacheFile {
            checksum: self.checksum,
            filename: self.filename,
            mime_type: self.mime_type,
            file_size: self.file_size,
            location,
            groups: self.groups,
            expiration_date: self.expiration_date,
        }
    }
}

fn decompose_location(location: &CacheLocation) -> (&'static str, Option<&str>, Option<&str>) {
    match location {
        CacheLocation::Internal { path } => ("internal", Some(path.as_str()), None),
        CacheLocation::External { storage } => ("external", None, Some(storage.as_str())),
    }
}

/// Repository for the cache_files table.
#[derive(Clone)]
pub struct PgCacheFileRepository {
    pool: PgPool,
}

impl PgCacheFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheFileRepository for PgCacheFileRepository {
    #[tracing::instrument(skip(self, cache_file), fields(db.table = "cache_files", checksum = %cache_file.checksum))]
    async fn upsert(&self, cache_file: CacheFile) -> Result<(), AppError> {
        let (kind, path, storage) = decompose_location(&cache_file.location);
        sqlx::query(
            r#"
            INSERT INTO cache_files
                (checksum, filename, mime_type, file_size, kind, path, storage, groups, expiration_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (checksum) DO UPDATE SET
                filename = EXCLUDED.filename,
                mime_type = EXCLUDED.mime_type,
                file_size = EXCLUDED.file_size,
                kind = EXCLUDED.kind,
                path = EXCLUDED.path,
                storage = EXCLUDED.storage,
                groups = EXCLUDED.groups,
                expiration_date = EXCLUDED.expiration_date
            "#,
        )
        .bind(&cache_file.checksum)
        .bind(&cache_file.filename)
        .bind(&cache_file.mime_type)
        .bind(cache_file.file_size)
        .bind(kind)
        .bind(path)
        .bind(storage)
        .bind(&cache_file.groups)
        .bind(cache_file.expiration_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cache_files"))]
    async fn find_by_checksum(&self, checksum: &str) -> Result<Option<CacheFile>, AppError> {
        let row: Option<CacheFileRow> = sqlx::query_as::<Postgres, CacheFileRow>(&format!(
            "SELECT {} FROM cache_files WHERE checksum = $1",
            COLUMNS
        ))
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CacheFileRow::into_cache_file))
    }

    #[tracing::instrument(skip(self, checksums), fields(db.table = "cache_files", count = checksums.len()))]
    async fn find_by_checksums(&self, checksums: &[String]) -> Result<Vec<CacheFile>, AppError> {
        if checksums.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<CacheFileRow> = sqlx::query_as::<Postgres, CacheFileRow>(&format!(
            "SELECT {} FROM cache_files WHERE checksum = ANY($1)",
            COLUMNS
        ))
        .bind(checksums)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CacheFileRow::into_cache_file).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cache_files"))]
    async fn delete_by_checksum(&self, checksum: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM cache_files WHERE checksum = $1")
            .bind(checksum)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cache_files"))]
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<CacheFile>, AppError> {
        let rows: Vec<CacheFileRow> = sqlx::query_as::<Postgres, CacheFileRow>(&format!(
            "SELECT {} FROM cache_files WHERE expiration_date <= $1",
            COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CacheFileRow::into_cache_file).collect())
    }
}
