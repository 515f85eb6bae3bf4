//! Warehouse client seam.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ferry_core::{LoadOptions, TableRef};

use crate::error::WarehouseError;

/// One load submission: staged objects into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub destination: TableRef,
    pub source_uris: Vec<String>,
    pub options: LoadOptions,
}

/// Reference to a submitted load job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub project_id: String,
    pub job_id: String,
    pub location: Option<String>,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}:{}.{}", self.project_id, location, self.job_id),
            None => write!(f, "{}:{}", self.project_id, self.job_id),
        }
    }
}

/// Job state as reported by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    /// Terminal; `error` is set when the job failed.
    Done { error: Option<String> },
}

/// Submit and inspect asynchronous load jobs.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle, WarehouseError>;

    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, WarehouseError>;
}
