use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{validate_key, BlobStore, StorageError};
use crate::images::ContentType;

/// Bucket BOQ item images are published under.
pub const DEFAULT_BUCKET: &str = "boq-images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
}

/// In-process [`BlobStore`] that keeps objects in a map.
///
/// Keys are never overwritten. URLs have the form `{base_url}/{bucket}/{key}`.
pub struct MemoryBlobStore {
    base_url: String,
    bucket: String,
    quota_bytes: Option<u64>,
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            quota_bytes: None,
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Reject stores that would push the total stored bytes past `quota_bytes`.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .expect("blob store mutex poisoned")
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("blob store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("blob store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(
        &self,
        bytes: &[u8],
        content_type: ContentType,
        key: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;

        let mut objects = self.objects.lock().expect("blob store mutex poisoned");
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        if let Some(quota) = self.quota_bytes {
            let used: u64 = objects.values().map(|o| o.bytes.len() as u64).sum();
            if used.saturating_add(bytes.len() as u64) > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type,
            },
        );
        Ok(self.url_for(key))
    }
}
