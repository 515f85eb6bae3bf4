use std::sync::Arc;

use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info, warn};

use ferry_core::ObjectLocator;

use crate::error::StorageError;

/// Owns one staged object until [`cleanup`](Self::cleanup) deletes it.
///
/// Cleanup consumes the handle, so it runs at most once. A handle dropped
/// without cleanup (panic, cancelled future) schedules a best-effort delete
/// on the current Tokio runtime.
pub struct StagingHandle {
    store: Arc<dyn ObjectStore>,
    locator: ObjectLocator,
    path: Path,
    size: u64,
    released: bool,
}

impl std::fmt::Debug for StagingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingHandle")
            .field("locator", &self.locator)
            .field("size", &self.size)
            .finish()
    }
}

impl StagingHandle {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        locator: ObjectLocator,
        path: Path,
        size: u64,
    ) -> Self {
        Self {
            store,
            locator,
            path,
            size,
            released: false,
        }
    }

    pub fn locator(&self) -> &ObjectLocator {
        &self.locator
    }

    /// Bytes copied into the staged object.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the staged object. An already-absent object is success.
    pub async fn cleanup(mut self) -> Result<(), StorageError> {
        self.released = true;
        match self.store.delete(&self.path).await {
            Ok(()) => {
                info!(staging = %self.locator, "Cleaned up staged object");
                Ok(())
            }
            Err(object_store::Error::NotFound { .. }) => {
                debug!(staging = %self.locator, "staged object already absent");
                Ok(())
            }
            Err(source) => Err(StorageError::Delete {
                locator: self.locator.to_string(),
                source,
            }),
        }
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(staging = %self.locator, "staged object dropped outside a runtime, not deleted");
            return;
        };
        warn!(staging = %self.locator, "staged object dropped without cleanup, deleting in background");
        let store = self.store.clone();
        let path = self.path.clone();
        let locator = self.locator.to_string();
        runtime.spawn(async move {
            match store.delete(&path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => warn!(staging = %locator, error = %e, "background cleanup failed"),
            }
        });
    }
}
