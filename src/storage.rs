use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};

/// StorageService
///
/// Contract for the object storage layer. The upload controller only talks to
/// this trait, so the S3 client can be replaced by `MockStorageService` in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if needed. Used at local startup against MinIO.
    async fn ensure_bucket_exists(&self);

    /// Stores `body` under `key` and returns the public URL of the object.
    ///
    /// # Arguments
    /// * `key`: object key (path + filename) inside the bucket.
    /// * `content_type`: MIME type recorded on the object.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String>;
}

/// S3StorageClient
///
/// `StorageService` on top of the AWS SDK. Works against MinIO locally and the
/// Supabase Storage S3 gateway in production.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Constructs the S3 client from the values resolved by `AppConfig`.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // MinIO and Supabase only understand path-style addressing.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            // Usually BucketAlreadyOwnedByYou.
            tracing::debug!(bucket = %self.bucket_name, "create_bucket: {}", e);
        }
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err("empty object key".to_string());
        }

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// sanitize_key
///
/// Strips empty, `.` and `..` segments so a key can never escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// StoredObject
///
/// What the mock remembers about each `put_object` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Clones share the same record of stored
/// objects, so a test can keep a handle and inspect what the controller wrote.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<StoredObject>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of every object stored so far, in call order.
    pub fn stored(&self) -> Vec<StoredObject> {
        self.stored
            .lock()
            .map(|objects| objects.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let sanitized_key = sanitize_key(key);
        self.stored
            .lock()
            .map_err(|e| e.to_string())?
            .push(StoredObject {
                key: sanitized_key.clone(),
                content_type: content_type.to_string(),
                size: body.len(),
            });

        Ok(format!("http://localhost:9000/mock-bucket/{}", sanitized_key))
    }
}

/// StorageState
///
/// The concrete type used to share storage access across the application state.
pub type StorageState = Arc<dyn StorageService>;
