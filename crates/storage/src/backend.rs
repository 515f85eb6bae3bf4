use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info};

use ferry_core::config::{AwsConfig, CloudConfig, GcpConfig};
use ferry_core::{ObjectLocator, GCS_SCHEME, S3_SCHEME};

use crate::error::StorageError;

/// Hands out the `ObjectStore` serving a locator's bucket.
pub trait StoreProvider: Send + Sync {
    fn store(&self, locator: &ObjectLocator) -> Result<Arc<dyn ObjectStore>, StorageError>;
}

/// Object-store path for a key.
///
/// Keys `Path` cannot hold verbatim (empty segments, a leading or trailing
/// `/`, `.` or `..` segments) are rejected rather than rewritten, since a
/// rewritten key names a different object.
pub fn object_path(key: &str) -> Result<Path, object_store::Error> {
    let path = Path::parse(key)?;
    if path.as_ref() != key {
        return Err(object_store::path::Error::EmptySegment {
            path: key.to_string(),
        }
        .into());
    }
    Ok(path)
}

type StoreKey = (String, String);

/// S3 and GCS clients, one per `(scheme, bucket)`, built on first use.
pub struct CloudStores {
    aws: AwsConfig,
    gcs_key: Option<String>,
    bucket_regions: HashMap<String, String>,
    cache: Mutex<HashMap<StoreKey, Arc<dyn ObjectStore>>>,
}

impl CloudStores {
    pub fn new(cloud: &CloudConfig) -> Result<Self, StorageError> {
        Ok(Self {
            aws: cloud.aws.clone(),
            gcs_key: gcs_service_account_key(&cloud.gcp)?,
            bucket_regions: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Per-bucket region overrides for source buckets.
    pub fn with_bucket_regions(mut self, regions: HashMap<String, String>) -> Self {
        self.bucket_regions = regions;
        self
    }

    fn build(&self, scheme: &str, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        match scheme {
            S3_SCHEME => self.build_s3(bucket),
            GCS_SCHEME => self.build_gcs(bucket),
            other => Err(StorageError::UnsupportedScheme(other.to_string())),
        }
    }

    fn build_s3(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let aws = &self.aws;
        let region = self
            .bucket_regions
            .get(bucket)
            .map(String::as_str)
            .unwrap_or(&aws.region);

        let mut builder = AmazonS3Builder::new().with_region(region);

        if let Some(ref key) = aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(ref token) = aws.session_token {
            builder = builder.with_token(token);
        }

        if let Some(endpoint_url) = aws.endpoint_url(&aws.s3_endpoint) {
            let allow_http = endpoint_url.starts_with("http://");
            builder = if aws.s3_force_path_style {
                builder.with_bucket_name(bucket).with_endpoint(&endpoint_url)
            } else {
                // Virtual-hosted style expects the bucket in the endpoint host.
                let hosted = match endpoint_url.split_once("://") {
                    Some((scheme, host)) => format!("{scheme}://{bucket}.{host}"),
                    None => endpoint_url.clone(),
                };
                builder
                    .with_bucket_name(bucket)
                    .with_endpoint(&hosted)
                    .with_virtual_hosted_style_request(true)
            };
            builder = builder.with_allow_http(allow_http);
        } else {
            builder = builder.with_url(format!("s3://{bucket}"));
        }

        let store = builder.build()?;
        info!(bucket, region, "Storage: S3 store ready");
        Ok(Arc::new(store))
    }

    fn build_gcs(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
        if let Some(ref key) = self.gcs_key {
            builder = builder.with_service_account_key(key);
        }
        let store = builder.build()?;
        info!(bucket, "Storage: GCS store ready");
        Ok(Arc::new(store))
    }
}

impl StoreProvider for CloudStores {
    fn store(&self, locator: &ObjectLocator) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let key = (locator.scheme.clone(), locator.bucket.clone());
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = cache.get(&key) {
            return Ok(store.clone());
        }
        debug!(scheme = %key.0, bucket = %key.1, "building object store");
        let store = self.build(&key.0, &key.1)?;
        cache.insert(key, store.clone());
        Ok(store)
    }
}

/// Service-account key handed to the GCS builder.
///
/// `gcs_endpoint` and `without_authentication` are expressed through the
/// key's `gcs_base_url` / `disable_oauth` fields, which is how the GCS client
/// is pointed at an emulator.
fn gcs_service_account_key(gcp: &GcpConfig) -> Result<Option<String>, StorageError> {
    let key = gcp
        .credential_json()
        .map_err(|e| StorageError::NotConfigured(e.to_string()))?;
    let endpoint = gcp
        .gcs_endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    if key.is_none() && endpoint.is_none() && !gcp.without_authentication {
        // Application default credentials.
        return Ok(None);
    }

    let mut value = match key {
        Some(raw) if !gcp.without_authentication => serde_json::from_str(&raw).map_err(|e| {
            StorageError::NotConfigured(format!("gcp credential is not valid JSON: {e}"))
        })?,
        _ => serde_json::json!({
            "private_key": "",
            "private_key_id": "",
            "client_email": "",
        }),
    };
    if let Some(obj) = value.as_object_mut() {
        if let Some(endpoint) = endpoint {
            obj.insert("gcs_base_url".into(), endpoint.trim_end_matches('/').into());
        }
        if gcp.without_authentication {
            obj.insert("disable_oauth".into(), true.into());
        }
    }
    Ok(Some(value.to_string()))
}

/// In-memory stores, one per `(scheme, bucket)`, created on first use.
#[derive(Default)]
pub struct MemoryStores {
    stores: Mutex<HashMap<StoreKey, Arc<InMemory>>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete in-memory store behind a bucket.
    pub fn bucket(&self, scheme: &str, bucket: &str) -> Arc<InMemory> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores
            .entry((scheme.to_string(), bucket.to_string()))
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl StoreProvider for MemoryStores {
    fn store(&self, locator: &ObjectLocator) -> Result<Arc<dyn ObjectStore>, StorageError> {
        Ok(self.bucket(&locator.scheme, &locator.bucket))
    }
}
