//! S3-compatible object store with explicit endpoint and static credentials.

use crate::{ObjectStore, PutOutcome, Result, StorageError};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://minio:9000`.
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub connect_timeout: Duration,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Initial backoff between attempts.
    pub retry_interval: Duration,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("bucket", &self.bucket)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

/// Result of bucket provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

/// Object store backed by one S3 bucket.
///
/// Creating an S3 client is relatively expensive; clone the store to share it.
#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for the configured endpoint.
    ///
    /// Path-style addressing is forced since MinIO does not resolve
    /// virtual-hosted bucket names.
    pub async fn connect(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        );
        let retry = RetryConfig::standard()
            .with_max_attempts(config.max_attempts.max(1))
            .with_initial_backoff(config.retry_interval);
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(retry)
            .timeout_config(timeouts)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 client configured for {} (bucket {})",
            config.endpoint, config.bucket
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket if it does not exist yet.
    ///
    /// A bucket created concurrently by someone else counts as existing.
    pub async fn ensure_bucket(&self, region: &str) -> Result<BucketStatus> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Bucket '{}' already exists", self.bucket);
                return Ok(BucketStatus::AlreadyExists);
            }
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                    || status_code(&err) == Some(404);
                if !not_found {
                    return Err(StorageError::s3("HeadBucket", &self.bucket, err));
                }
            }
        }

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 is the default location and must not be sent explicitly.
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("Bucket '{}' created", self.bucket);
                Ok(BucketStatus::Created)
            }
            Err(err) => {
                let exists = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if exists {
                    info!("Bucket '{}' already exists", self.bucket);
                    Ok(BucketStatus::AlreadyExists)
                } else {
                    Err(StorageError::s3("CreateBucket", &self.bucket, err))
                }
            }
        }
    }
}

fn status_code<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::s3("PutObject", key, e))?;
        debug!("Wrote {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<PutOutcome> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(data))
            .send()
            .await;

        match result {
            Ok(_) => Ok(PutOutcome::Created),
            Err(err) => {
                let precondition_failed = matches!(status_code(&err), Some(412) | Some(409))
                    || err.code() == Some("PreconditionFailed");
                if precondition_failed {
                    debug!("s3://{}/{} already exists", self.bucket, key);
                    Ok(PutOutcome::AlreadyExists)
                } else {
                    Err(StorageError::s3("PutObject", key, err))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                    || status_code(&err) == Some(404);
                if missing {
                    return Ok(None);
                }
                return Err(StorageError::s3("GetObject", key, err));
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::s3("GetObject", key, e))?;
        Ok(Some(body.into_bytes()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::s3("ListObjectsV2", prefix, e))?;

            for object in response.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    // Skip "directory" markers
                    if !key.ends_with('/') {
                        keys.push(key);
                    }
                }
            }

            // Handle pagination
            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        keys.sort();
        debug!(
            "Listed {} objects under s3://{}/{}",
            keys.len(),
            self.bucket,
            prefix
        );
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // DeleteObject succeeds for missing keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::s3("DeleteObject", key, e))?;
        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
