//! Wire an [`Orchestrator`] from configuration.

use std::sync::Arc;

use tracing::info;

use ferry_core::Config;
use ferry_queue::{BackoffPolicy, QueueService, Receiver, SqsQueue};
use ferry_rules::Resolver;
use ferry_storage::{CloudStores, StoreProvider, Transporter};
use ferry_warehouse::{BigQueryClient, Loader, WarehouseClient};

use crate::error::Result;
use crate::orchestrator::Orchestrator;

/// A wired pipeline.
pub struct Pipeline {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build against the real services: SQS, S3/GCS and BigQuery.
pub async fn build(config: &Config) -> Result<Pipeline> {
    let resolver = Resolver::from_config(config)?;
    let stores = CloudStores::new(&config.cloud)?.with_bucket_regions(resolver.bucket_regions());
    let warehouse = BigQueryClient::from_config(&config.cloud.gcp)?;
    let queue = SqsQueue::new(&config.cloud.aws, &config.receiver).await;
    info!(rules = resolver.len(), queue_name = %config.queue_name, "pipeline built");
    Ok(assemble(
        config,
        resolver,
        Arc::new(queue),
        Arc::new(stores),
        Arc::new(warehouse),
    ))
}

/// Build with caller-supplied services; rules and policies still come from
/// `config`.
pub fn build_with(
    config: &Config,
    queue: Arc<dyn QueueService>,
    stores: Arc<dyn StoreProvider>,
    warehouse: Arc<dyn WarehouseClient>,
) -> Result<Pipeline> {
    let resolver = Resolver::from_config(config)?;
    Ok(assemble(config, resolver, queue, stores, warehouse))
}

fn assemble(
    config: &Config,
    resolver: Resolver,
    queue: Arc<dyn QueueService>,
    stores: Arc<dyn StoreProvider>,
    warehouse: Arc<dyn WarehouseClient>,
) -> Pipeline {
    let receiver = Receiver::new(
        queue,
        config.queue_name.clone(),
        BackoffPolicy::from(&config.receiver.ack_retry),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(receiver),
        Arc::new(resolver),
        Arc::new(Transporter::new(stores)),
        Arc::new(Loader::new(warehouse, &config.loader)),
    );
    Pipeline {
        orchestrator: Arc::new(orchestrator),
    }
}
