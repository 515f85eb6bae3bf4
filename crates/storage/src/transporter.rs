//! Stream a source object into the staging store.

use std::sync::Arc;

use futures::StreamExt;
use object_store::WriteMultipart;
use tracing::{debug, info, warn};

use ferry_core::{Job, ObjectLocator};

use crate::backend::{object_path, StoreProvider};
use crate::error::StorageError;
use crate::staging::StagingHandle;

/// In-flight parts per upload.
const MAX_CONCURRENT_PARTS: usize = 8;

/// Copies objects between stores without buffering whole objects.
#[derive(Clone)]
pub struct Transporter {
    stores: Arc<dyn StoreProvider>,
}

impl Transporter {
    pub fn new(stores: Arc<dyn StoreProvider>) -> Self {
        Self { stores }
    }

    /// Copy `job.source` to `job.staging`.
    pub async fn transport(&self, job: &Job) -> Result<StagingHandle, StorageError> {
        self.copy(&job.source, &job.staging).await
    }

    /// Stream `source` into `staging`.
    ///
    /// On any failure the partial upload is aborted and no handle is
    /// returned, so there is nothing for the caller to clean up.
    pub async fn copy(
        &self,
        source: &ObjectLocator,
        staging: &ObjectLocator,
    ) -> Result<StagingHandle, StorageError> {
        let source_store = self.stores.store(source)?;
        let staging_store = self.stores.store(staging)?;
        let read_err = |e| StorageError::Read {
            locator: source.to_string(),
            source: e,
        };
        let write_err = |e| StorageError::Write {
            locator: staging.to_string(),
            source: e,
        };

        let source_path = object_path(&source.key).map_err(read_err)?;
        let staging_path = object_path(&staging.key).map_err(write_err)?;

        debug!(source = %source, staging = %staging, "opening streams");
        let result = source_store.get(&source_path).await.map_err(read_err)?;
        let expected = result.meta.size;
        let mut stream = result.into_stream();

        let upload = staging_store
            .put_multipart(&staging_path)
            .await
            .map_err(write_err)?;
        let mut writer = WriteMultipart::new(upload);

        let mut copied = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    abort(writer, staging).await;
                    return Err(read_err(e));
                }
            };
            if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                abort(writer, staging).await;
                return Err(write_err(e));
            }
            copied += chunk.len() as u64;
            writer.write(&chunk);
        }
        writer.finish().await.map_err(write_err)?;

        if copied != expected as u64 {
            warn!(source = %source, expected, copied, "copied size differs from source metadata");
        }
        info!(source = %source, staging = %staging, bytes = copied, "Transported object");

        Ok(StagingHandle::new(staging_store, staging.clone(), staging_path, copied))
    }
}

async fn abort(writer: WriteMultipart, staging: &ObjectLocator) {
    if let Err(e) = writer.abort().await {
        warn!(staging = %staging, error = %e, "failed to abort partial upload");
    }
}
