//! Scheme-qualified object addresses (`s3://bucket/key`, `gs://bucket/key`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LocatorError;

/// Scheme used for Amazon S3 source objects.
pub const S3_SCHEME: &str = "s3";
/// Scheme used for Google Cloud Storage staging objects.
pub const GCS_SCHEME: &str = "gs";

/// Address of one object in an object store.
///
/// The key is kept verbatim: no percent-decoding or normalisation happens
/// here, so `s3://b/a b.csv` round-trips through [`Display`] and [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectLocator {
    pub fn new(
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(S3_SCHEME, bucket, key)
    }

    pub fn gcs(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(GCS_SCHEME, bucket, key)
    }

    pub fn is_s3(&self) -> bool {
        self.scheme == S3_SCHEME
    }

    /// Full URI form, e.g. `gs://tmp-bucket/data/part-0001.csv`.
    pub fn uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl FromStr for ObjectLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| LocatorError::MissingScheme(s.to_string()))?;

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(LocatorError::MissingBucket(s.to_string()));
        }

        Ok(Self::new(scheme, bucket, key))
    }
}
