//! Storage handoff for extracted row images.
//!
//! The extractor never talks to a storage backend directly. Callers provide a [`BlobStore`]
//! and [`upload_row_images`] hands every [`RowImage`] to it, collecting `row -> URL`. A failure
//! to store one image is recorded and skipped; it never loses the images of other rows.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::images::{ContentType, RowImage};

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, StoredObject, DEFAULT_BUCKET};

#[derive(Debug, Error)]
pub enum StorageError {
    /// Objects are never overwritten; the key is already taken.
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer-provided object storage.
///
/// `store` persists `bytes` under `key` and returns a publicly dereferenceable URL.
/// Implementations are shared across concurrent upload requests.
pub trait BlobStore: Send + Sync {
    fn store(
        &self,
        bytes: &[u8],
        content_type: ContentType,
        key: &str,
    ) -> Result<String, StorageError>;
}

/// Reject keys that could escape a store's namespace: empty, absolute, `\`-separated, or with
/// empty / `.` / `..` segments.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !matches!(segment, "" | "." | ".."));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Object key for one row image: `{project}/{token}-{row}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageKey {
    pub project_id: String,
    pub token: String,
    pub row: u32,
    pub content_type: ContentType,
}

impl ImageKey {
    pub fn new(
        project_id: impl Into<String>,
        token: impl Into<String>,
        row: u32,
        content_type: ContentType,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            token: token.into(),
            row,
            content_type,
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-{}.{}",
            self.project_id,
            self.token,
            self.row,
            self.content_type.extension()
        )
    }
}

/// Per-upload key scope: which project the images belong to and a token that keeps keys from
/// separate imports of the same project apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContext {
    pub project_id: String,
    pub token: String,
}

impl UploadContext {
    /// Scope keys to `project_id`, using the current Unix time in milliseconds as the token.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            token: chrono::Utc::now().timestamp_millis().to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn key_for(&self, image: &RowImage) -> ImageKey {
        ImageKey::new(
            self.project_id.clone(),
            self.token.clone(),
            image.row,
            image.content_type,
        )
    }
}

#[derive(Debug)]
pub struct FailedUpload {
    pub row: u32,
    pub key: String,
    pub error: StorageError,
}

/// Outcome of handing a row-image mapping to a [`BlobStore`].
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Rows that were stored, with their public URL.
    pub urls: BTreeMap<u32, String>,
    /// Rows whose store call failed. These rows are absent from `urls`.
    pub failed: Vec<FailedUpload>,
    /// Set when the upload was cancelled before every row was attempted.
    pub cancelled: bool,
}

impl UploadReport {
    pub fn failed_rows(&self) -> Vec<u32> {
        self.failed.iter().map(|f| f.row).collect()
    }
}

/// Store every row image and collect `row -> URL`.
///
/// Rows are uploaded in ascending row order. A store failure is logged and recorded in
/// [`UploadReport::failed`]; the remaining rows are still attempted.
pub fn upload_row_images<S: BlobStore + ?Sized>(
    images: &BTreeMap<u32, RowImage>,
    store: &S,
    ctx: &UploadContext,
) -> UploadReport {
    upload_row_images_cancellable(images, store, ctx, &AtomicBool::new(false))
}

/// Like [`upload_row_images`], but checks `cancelled` before each store call.
///
/// Once the flag is set no further calls are issued. Calls already made are not undone.
pub fn upload_row_images_cancellable<S: BlobStore + ?Sized>(
    images: &BTreeMap<u32, RowImage>,
    store: &S,
    ctx: &UploadContext,
    cancelled: &AtomicBool,
) -> UploadReport {
    let mut report = UploadReport::default();

    for image in images.values() {
        if cancelled.load(Ordering::Acquire) {
            log::info!(
                "upload cancelled with {} of {} images attempted",
                report.urls.len() + report.failed.len(),
                images.len()
            );
            report.cancelled = true;
            break;
        }

        let key = ctx.key_for(image).to_string();
        match store.store(&image.bytes, image.content_type, &key) {
            Ok(url) => {
                report.urls.insert(image.row, url);
            }
            Err(error) => {
                log::warn!("row {}: failed to store {key}: {error}", image.row);
                report.failed.push(FailedUpload {
                    row: image.row,
                    key,
                    error,
                });
            }
        }
    }

    log::info!(
        "stored {} images for project {} ({} failed)",
        report.urls.len(),
        ctx.project_id,
        report.failed.len()
    );
    report
}
