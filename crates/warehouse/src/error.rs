/// Errors from warehouse load operations.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// The load job could not be submitted.
    #[error("submit load to {destination} failed: {reason}")]
    Submit { destination: String, reason: String },

    /// The job was accepted but finished with an error.
    #[error("load job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// The job did not reach a terminal state in time.
    #[error("load job {job_id} timed out after {seconds}s")]
    Timeout { job_id: String, seconds: u64 },

    /// Status polling failed.
    #[error("poll load job {job_id} failed: {reason}")]
    Poll { job_id: String, reason: String },

    /// Obtaining an access token failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
