//! The four collaborators an [`Orchestrator`](crate::Orchestrator) is built from.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ferry_core::{Job, ObjectLocator};
use ferry_queue::{Delivery, QueueError, Receiver};
use ferry_rules::Resolver;
use ferry_storage::{StagingHandle, StorageError, Transporter};
use ferry_warehouse::{Loader, WarehouseError};

/// Where notifications come from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn receive(&self, cancel: &CancellationToken) -> Result<Delivery, QueueError>;

    /// Retarget to another queue.
    async fn set_queue_name(&self, queue_name: &str);
}

/// Decides which jobs a batch of locators produces.
pub trait Router: Send + Sync {
    fn resolve(&self, locators: &[ObjectLocator]) -> Vec<Job>;
}

/// Copies a job's source object into staging.
#[async_trait]
pub trait ObjectCopier: Send + Sync {
    async fn transport(&self, job: &Job) -> Result<StagingHandle, StorageError>;
}

/// Loads a job's staged object into the warehouse.
#[async_trait]
pub trait WarehouseLoader: Send + Sync {
    async fn load(&self, job: &Job) -> Result<(), WarehouseError>;
}

#[async_trait]
impl MessageSource for Receiver {
    async fn receive(&self, cancel: &CancellationToken) -> Result<Delivery, QueueError> {
        Receiver::receive(self, cancel).await
    }

    async fn set_queue_name(&self, queue_name: &str) {
        Receiver::set_queue_name(self, queue_name).await
    }
}

impl Router for Resolver {
    fn resolve(&self, locators: &[ObjectLocator]) -> Vec<Job> {
        Resolver::resolve(self, locators)
    }
}

#[async_trait]
impl ObjectCopier for Transporter {
    async fn transport(&self, job: &Job) -> Result<StagingHandle, StorageError> {
        Transporter::transport(self, job).await
    }
}

#[async_trait]
impl WarehouseLoader for Loader {
    async fn load(&self, job: &Job) -> Result<(), WarehouseError> {
        Loader::load(self, job).await.map(|_| ())
    }
}
