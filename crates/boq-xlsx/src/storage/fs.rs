use std::io;
use std::path::PathBuf;

use super::{validate_key, BlobStore, StorageError};
use crate::images::ContentType;

/// [`BlobStore`] that writes each object to `{root}/{key}` and serves it from
/// `{public_base_url}/{key}`.
///
/// Files are created atomically and never replaced.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl BlobStore for FsBlobStore {
    fn store(
        &self,
        bytes: &[u8],
        _content_type: ContentType,
        key: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;

        let dest = self.path_for(key);
        boq_fs::write_new(&dest, bytes).map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}
