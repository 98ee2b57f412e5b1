//! Bounded access to the permission store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use permissions_sdk::{PermissionStore, StoreError};

use super::error::DomainError;

/// Permission store handle that puts a deadline on every call.
///
/// There are no retries: a call that misses the deadline fails with
/// [`DomainError::StorageTimeout`] and the caller decides what to do.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl Storage {
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    #[must_use]
    pub fn store(&self) -> &dyn PermissionStore {
        self.store.as_ref()
    }

    /// Await a store future under the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`DomainError::StorageTimeout`] if the deadline passes
    /// - [`DomainError::Storage`] if the store reports an error
    pub async fn with_timeout<T, F>(&self, operation: &'static str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(DomainError::from),
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Storage call timed out"
                );
                Err(DomainError::StorageTimeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}
