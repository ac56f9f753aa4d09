use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use serde::Deserialize;
use std::sync::Arc;
use tokio::fs;

use stowage_core::models::{
    FileCacheRequest, FileDeletionRequest, FileStorageRequest, StorageLocationConfiguration,
};
use stowage_core::StorageKind;

use crate::digest::verify_checksum;
use crate::progress::{DeletionProgress, StorageProgress};
use crate::subset::{
    DeletionWorkingSubset, PreparationResponse, RestorationWorkingSubset, StorageWorkingSubset,
};
use crate::traits::{StorageBackend, StorageError, StorageResult};
use crate::urls;

const DEFAULT_SUBSET_MAX_SIZE: usize = 100;

fn default_subset_max_size() -> usize {
    DEFAULT_SUBSET_MAX_SIZE
}

/// Backend-specific configuration for [`S3Storage`].
#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    pub bucket: String,
    /// AWS region (or region identifier for S3-compatible providers).
    pub region: String,
    /// Custom endpoint URL for S3-compatible providers
    /// (e.g., "http://localhost:9000" for MinIO).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_subset_max_size")]
    pub subset_max_size: usize,
}

impl S3StorageConfig {
    /// Parse and validate the configuration payload. Pure.
    pub fn parse(value: &serde_json::Value) -> StorageResult<Self> {
        let config: S3StorageConfig = serde_json::from_value(value.clone()).map_err(|e| {
            StorageError::ConfigError(format!("invalid S3 storage configuration: {}", e))
        })?;
        if config.bucket.is_empty() || config.region.is_empty() {
            return Err(StorageError::ConfigError(
                "S3 bucket and region must not be empty".to_string(),
            ));
        }
        if config.subset_max_size == 0 {
            return Err(StorageError::ConfigError(
                "subset_max_size must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Public URL for an object key.
///
/// For AWS S3 the standard virtual-hosted format; for S3-compatible
/// providers, path-style under the custom endpoint.
fn build_url(bucket: &str, region: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

/// URL prefix every object stored by this instance shares.
fn url_prefix(bucket: &str, region: &str, endpoint: Option<&str>) -> String {
    build_url(bucket, region, endpoint, "")
}

/// Online S3 storage backend.
#[derive(Clone)]
pub struct S3Storage {
    name: String,
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    subset_max_size: usize,
}

impl S3Storage {
    pub fn from_configuration(conf: &StorageLocationConfiguration) -> StorageResult<Self> {
        let config = S3StorageConfig::parse(&conf.configuration)?;
        if conf.kind != StorageKind::Online {
            return Err(StorageError::ConfigError(format!(
                "s3 backend only serves online locations, {} is {}",
                conf.name, conf.kind
            )));
        }

        // Build the AmazonS3 object store from environment plus explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            name: conf.name.clone(),
            store,
            bucket: config.bucket,
            region: config.region,
            endpoint_url: config.endpoint,
            subset_max_size: config.subset_max_size,
        })
    }

    fn object_key(&self, request: &FileStorageRequest) -> StorageResult<String> {
        let key = match &request.subdirectory {
            Some(sub) => format!("{}/{}", sub.trim_matches('/'), request.checksum),
            None => request.checksum.clone(),
        };
        urls::validate_key(&key)?;
        Ok(key)
    }

    fn generate_url(&self, key: &str) -> String {
        build_url(&self.bucket, &self.region, self.endpoint_url.as_deref(), key)
    }

    fn key_from_url(&self, url: &str) -> StorageResult<String> {
        let prefix = url_prefix(&self.bucket, &self.region, self.endpoint_url.as_deref());
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                StorageError::InvalidUrl(format!("URL {} is not stored in bucket {}", url, self.bucket))
            })
    }

    async fn store_one(&self, request: &FileStorageRequest) -> StorageResult<(String, i64)> {
        let source = urls::file_url_to_path(&request.origin_url)?;
        let data = fs::read(&source).await.map_err(|e| {
            StorageError::StoreFailed(format!(
                "failed to read source {}: {}",
                source.display(),
                e
            ))
        })?;
        verify_checksum(&request.algorithm, &request.checksum, &data)?;

        let key = self.object_key(request)?;
        let size = data.len() as i64;
        let location = ObjectPath::from(key.clone());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 store failed"
            );
            StorageError::StoreFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 store successful"
        );

        Ok((self.generate_url(&key), size))
    }

    async fn delete_one(&self, request: &FileDeletionRequest) -> StorageResult<()> {
        let key = self.key_from_url(&request.file_url)?;
        let location = ObjectPath::from(key.clone());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(_) => {}
            // Already gone; deletion is idempotent.
            Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    fn chunked<R, S>(
        &self,
        accepted: Vec<R>,
        make: impl Fn(String, Vec<R>) -> S,
        response: &mut PreparationResponse<S>,
    ) {
        let mut iter = accepted.into_iter().peekable();
        while iter.peek().is_some() {
            let chunk: Vec<R> = iter.by_ref().take(self.subset_max_size).collect();
            response.add_working_subset(make(self.name.clone(), chunk));
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Online
    }

    fn prepare_for_storage(
        &self,
        requests: Vec<FileStorageRequest>,
    ) -> PreparationResponse<StorageWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();
        for request in requests {
            if let Err(e) = urls::file_url_to_path(&request.origin_url) {
                response.reject(request.id, format!("unreadable origin URL: {}", e));
                continue;
            }
            match self.object_key(&request) {
                Ok(_) => accepted.push(request),
                Err(e) => response.reject(request.id, e.to_string()),
            }
        }
        self.chunked(accepted, |s, r| StorageWorkingSubset::new(s, r), &mut response);
        response
    }

    fn prepare_for_deletion(
        &self,
        requests: Vec<FileDeletionRequest>,
    ) -> PreparationResponse<DeletionWorkingSubset> {
        let mut response = PreparationResponse::new();
        let mut accepted = Vec::new();
        for request in requests {
            match self.key_from_url(&request.file_url) {
                Ok(_) => accepted.push(request),
                Err(e) => response.reject(request.id, e.to_string()),
            }
        }
        self.chunked(accepted, |s, r| DeletionWorkingSubset::new(s, r), &mut response);
        response
    }

    fn prepare_for_restoration(
        &self,
        requests: Vec<FileCacheRequest>,
    ) -> PreparationResponse<RestorationWorkingSubset> {
        // Online S3 storage has no restore step.
        let mut response = PreparationResponse::new();
        for request in requests {
            response.reject(
                request.id,
                "restoration is not supported by online storage",
            );
        }
        response
    }

    async fn store(
        &self,
        subset: StorageWorkingSubset,
        progress: Arc<dyn StorageProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            match self.store_one(&request).await {
                Ok((url, size)) => progress.storage_succeeded(&request, &url, size).await,
                Err(e) => progress.storage_failed(&request, &e.to_string()).await,
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        subset: DeletionWorkingSubset,
        progress: Arc<dyn DeletionProgress>,
    ) -> StorageResult<()> {
        for request in subset.into_requests() {
            match self.delete_one(&request).await {
                Ok(()) => progress.deletion_succeeded(&request).await,
                Err(e) => progress.deletion_failed(&request, &e.to_string()).await,
            }
        }
        Ok(())
    }

    fn validate_url(&self, url: &str, errors: &mut Vec<String>) -> bool {
        match self.key_from_url(url) {
            Ok(_) => true,
            Err(e) => {
                errors.push(e.to_string());
                false
            }
        }
    }

    fn allows_physical_deletion(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_requires_bucket_and_region() {
        assert!(S3StorageConfig::parse(&json!({ "bucket": "b", "region": "eu-west-1" })).is_ok());
        assert!(S3StorageConfig::parse(&json!({ "bucket": "", "region": "eu-west-1" })).is_err());
        assert!(S3StorageConfig::parse(&json!({ "region": "eu-west-1" })).is_err());
    }

    #[test]
    fn standard_aws_url_format() {
        let url = build_url("archive", "eu-west-1", None, "sub/abc");
        assert_eq!(url, "https://archive.s3.eu-west-1.amazonaws.com/sub/abc");
        assert!(url.starts_with(&url_prefix("archive", "eu-west-1", None)));
    }

    #[test]
    fn endpoint_url_uses_path_style() {
        let url = build_url("archive", "local", Some("http://localhost:9000/"), "abc");
        assert_eq!(url, "http://localhost:9000/archive/abc");
    }

    #[test]
    fn prefix_strip_recovers_key() {
        let prefix = url_prefix("archive", "eu-west-1", None);
        let url = build_url("archive", "eu-west-1", None, "sub/abc");
        assert_eq!(url.strip_prefix(&prefix).unwrap(), "sub/abc");
    }
}
