//! Storage location configuration repository: rows keyed by name.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};

use stowage_core::models::StorageLocationConfiguration;
use stowage_core::{AppError, StorageKind};

use crate::traits::StorageLocationConfigurationRepository;

const COLUMNS: &str = "name, kind, backend_type, configuration, allocated_size_kb";

/// Row type for the storage_locations table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct StorageLocationRow {
    pub name: String,
    pub kind: StorageKind,
    pub backend_type: String,
    pub configuration: JsonValue,
    pub allocated_size_kb: Option<i64>,
}

impl StorageLocationRow {
    pub fn into_configuration(self) -> StorageLocationConfiguration {
        StorageLocationConfiguration {
            name: self.name,
            kind: self.kind,
            backend_type: self.backend_type,
            configuration: self.configuration,
            allocated_size_kb: self.allocated_size_kb,
        }
    }
}

/// Repository for the storage_locations table.
#[derive(Clone)]
pub struct PgStorageLocationRepository {
    pool: PgPool,
}

impl PgStorageLocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageLocationConfigurationRepository for PgStorageLocationRepository {
    #[tracing::instrument(skip(self, configuration), fields(db.table = "storage_locations", storage = %configuration.name))]
    async fn save(
        &self,
        configuration: StorageLocationConfiguration,
    ) -> Result<StorageLocationConfiguration, AppError> {
        let row: StorageLocationRow = sqlx::query_as::<Postgres, StorageLocationRow>(&format!(
            r#"
            INSERT INTO storage_locations (name, kind, backend_type, configuration, allocated_size_kb)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET
                kind = EXCLUDED.kind,
                backend_type = EXCLUDED.backend_type,
                configuration = EXCLUDED.configuration,
                allocated_size_kb = EXCLUDED.allocated_size_kb
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&configuration.name)
        .bind(configuration.kind)
        .bind(&configuration.backend_type)
        .bind(&configuration.configuration)
        .bind(configuration.allocated_size_kb)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_configuration())
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_locations"))]
    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StorageLocationConfiguration>, AppError> {
        let row: Option<StorageLocationRow> = sqlx::query_as::<Postgres, StorageLocationRow>(
            &format!("SELECT {} FROM storage_locations WHERE name = $1", COLUMNS),
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StorageLocationRow::into_configuration))
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_locations"))]
    async fn find_all(&self) -> Result<Vec<StorageLocationConfiguration>, AppError> {
        let rows: Vec<StorageLocationRow> = sqlx::query_as::<Postgres, StorageLocationRow>(
            &format!("SELECT {} FROM storage_locations ORDER BY name", COLUMNS),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(StorageLocationRow::into_configuration)
            .collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_locations"))]
    async fn find_by_kind(
        &self,
        kind: StorageKind,
    ) -> Result<Vec<StorageLocationConfiguration>, AppError> {
        let rows: Vec<StorageLocationRow> =
            sqlx::query_as::<Postgres, StorageLocationRow>(&format!(
                "SELECT {} FROM storage_locations WHERE kind = $1 ORDER BY name",
                COLUMNS
            ))
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(StorageLocationRow::into_configuration)
            .collect())
    }
}
