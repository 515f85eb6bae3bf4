//! Warehouse loads: submit a load job for staged objects and wait for it.
//!
//! - [`client`]: the [`WarehouseClient`] seam (submit + status)
//! - [`bigquery`]: BigQuery REST implementation (`jobs.insert` / `jobs.get`)
//! - [`auth`]: bearer-token providers for Google APIs
//! - [`loader`]: submit-then-poll with backoff and timeout

pub mod auth;
pub mod bigquery;
pub mod client;
pub mod error;
pub mod loader;

pub use auth::{
    token_provider, AnonymousToken, MetadataServerToken, ServiceAccountToken, TokenProvider,
};
pub use bigquery::BigQueryClient;
pub use client::{JobHandle, JobStatus, LoadRequest, WarehouseClient};
pub use error::WarehouseError;
pub use loader::Loader;
