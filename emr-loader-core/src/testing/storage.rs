//! In-memory [`StorageProvider`].

use crate::provider::{ProviderError, ProviderFuture, StorageProvider};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A call received by [`MockStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    /// head-bucket
    HeadBucket(String),
    /// create-bucket
    CreateBucket(String),
    /// upload-file
    Upload {
        /// Local path.
        path: PathBuf,
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
    },
}

/// Mock object store keeping buckets and objects in memory.
#[derive(Default)]
pub struct MockStorage {
    state: Mutex<MockStorageState>,
}

#[derive(Default)]
struct MockStorageState {
    buckets: HashSet<String>,
    objects: HashMap<(String, String), Vec<u8>>,
    head_error: Option<ProviderError>,
    calls: Vec<StorageCall>,
}

impl MockStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing bucket.
    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.state.lock().buckets.insert(bucket.into());
        self
    }

    /// Make every head-bucket call fail with `error`.
    pub fn with_head_error(self, error: ProviderError) -> Self {
        self.state.lock().head_error = Some(error);
        self
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().calls.clone()
    }

    /// Whether a bucket exists.
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().buckets.contains(bucket)
    }

    /// Contents of an uploaded object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

impl StorageProvider for MockStorage {
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(StorageCall::HeadBucket(bucket.to_string()));

            if let Some(err) = &state.head_error {
                return Err(err.clone());
            }
            if state.buckets.contains(bucket) {
                Ok(())
            } else {
                Err(ProviderError::NotFound {
                    resource: format!("bucket {}", bucket),
                })
            }
        })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(StorageCall::CreateBucket(bucket.to_string()));
            state.buckets.insert(bucket.to_string());
            Ok(())
        })
    }

    fn upload_file<'a>(
        &'a self,
        path: &'a Path,
        bucket: &'a str,
        key: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let contents = std::fs::read(path).map_err(|e| ProviderError::LocalFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            });

            let mut state = self.state.lock();
            state.calls.push(StorageCall::Upload {
                path: path.to_path_buf(),
                bucket: bucket.to_string(),
                key: key.to_string(),
            });

            let contents = contents?;
            if !state.buckets.contains(bucket) {
                return Err(ProviderError::NotFound {
                    resource: format!("bucket {}", bucket),
                });
            }
            state
                .objects
                .insert((bucket.to_string(), key.to_string()), contents);
            Ok(())
        })
    }
}
