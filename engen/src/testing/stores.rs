//! Object store doubles for failure paths.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::services::ObjectStore;

/// Wraps a store and fails every call that touches an unavailable bucket.
#[derive(Debug)]
pub struct OutageObjectStore<S> {
    inner: Arc<S>,
    down: BTreeSet<String>,
}

impl<S: ObjectStore> OutageObjectStore<S> {
    /// Wraps `inner` with every bucket available.
    #[must_use]
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            down: BTreeSet::new(),
        }
    }

    /// Marks a bucket as unavailable.
    #[must_use]
    pub fn with_outage(mut self, bucket: &str) -> Self {
        self.down.insert(bucket.to_string());
        self
    }

    fn check(&self, bucket: &str) -> Result<(), ServiceError> {
        if self.down.contains(bucket) {
            return Err(ServiceError::new(
                "object_store",
                format!("bucket '{bucket}' unavailable"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for OutageObjectStore<S> {
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ServiceError> {
        self.check(bucket)?;
        self.inner.read(bucket, path).await
    }

    async fn write(&self, bucket: &str, path: &str, content: Vec<u8>) -> Result<(), ServiceError> {
        self.check(bucket)?;
        self.inner.write(bucket, path, content).await
    }
}
