//! Submit a load job for a staged object and wait for it to finish.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ferry_core::config::LoaderConfig;
use ferry_core::Job;

use crate::client::{JobHandle, JobStatus, LoadRequest, WarehouseClient};
use crate::error::WarehouseError;

const BACKOFF_FACTOR: f64 = 1.5;

/// Consecutive failed status polls tolerated before giving up on a job.
const MAX_POLL_ERRORS: u32 = 5;

/// Drives one load job to a terminal state.
#[derive(Clone)]
pub struct Loader {
    client: Arc<dyn WarehouseClient>,
    poll_interval: Duration,
    max_poll_interval: Duration,
    timeout: Duration,
}

impl Loader {
    pub fn new(client: Arc<dyn WarehouseClient>, config: &LoaderConfig) -> Self {
        Self {
            client,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            max_poll_interval: Duration::from_millis(
                config.max_poll_interval_ms.max(config.poll_interval_ms),
            ),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Load `job.staging` into `job.destination`.
    pub async fn load(&self, job: &Job) -> Result<JobHandle, WarehouseError> {
        let request = LoadRequest {
            destination: job.destination.clone(),
            source_uris: vec![job.staging.uri()],
            options: job.options.clone(),
        };
        let handle = self.client.submit_load(&request).await?;
        self.wait(&handle).await?;
        info!(destination = %job.destination, job = %handle, "Loaded");
        Ok(handle)
    }

    /// Poll with exponential backoff until the job is done or the timeout passes.
    ///
    /// The job is already accepted, so a failed poll is retried; only
    /// `MAX_POLL_ERRORS` failures in a row end the wait early.
    async fn wait(&self, handle: &JobHandle) -> Result<(), WarehouseError> {
        let start = Instant::now();
        let mut delay = self.poll_interval;
        let mut poll_errors = 0;

        loop {
            match self.client.job_status(handle).await {
                Ok(status) => {
                    poll_errors = 0;
                    debug!(
                        job = %handle,
                        status = ?status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "polling load job"
                    );
                    if finished(handle, status)? {
                        return Ok(());
                    }
                }
                Err(e) => {
                    poll_errors += 1;
                    warn!(job = %handle, error = %e, attempt = poll_errors, "Can't poll load job");
                    if poll_errors >= MAX_POLL_ERRORS {
                        error!(job = %handle, "Giving up polling, job may still complete");
                        return Err(e);
                    }
                }
            }

            if start.elapsed() >= self.timeout {
                warn!(
                    job = %handle,
                    timeout_seconds = self.timeout.as_secs(),
                    "Load job timed out, job may still complete"
                );
                return Err(WarehouseError::Timeout {
                    job_id: handle.job_id.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }

            let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 10);
            tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
            delay = delay.mul_f64(BACKOFF_FACTOR).min(self.max_poll_interval);
        }
    }
}

/// `Ok(true)` once the job succeeded; a failed job is an error.
fn finished(handle: &JobHandle, status: JobStatus) -> Result<bool, WarehouseError> {
    match status {
        JobStatus::Done { error: None } => Ok(true),
        JobStatus::Done { error: Some(reason) } => {
            error!(job = %handle, reason = %reason, "Load job failed");
            Err(WarehouseError::JobFailed {
                job_id: handle.job_id.clone(),
                reason,
            })
        }
        JobStatus::Pending | JobStatus::Running => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferry_core::{LoadOptions, ObjectLocator, SourceFormat, TableRef};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of statuses; the last one repeats.
    struct FakeWarehouse {
        submit_error: Option<String>,
        statuses: Mutex<VecDeque<JobStatus>>,
        submitted: Mutex<Vec<LoadRequest>>,
        polls: Mutex<usize>,
        /// The first `failing_polls` status calls fail.
        failing_polls: usize,
    }

    impl FakeWarehouse {
        fn new(statuses: Vec<JobStatus>) -> Arc<Self> {
            Arc::new(Self {
                submit_error: None,
                statuses: Mutex::new(statuses.into()),
                submitted: Mutex::new(Vec::new()),
                polls: Mutex::new(0),
                failing_polls: 0,
            })
        }

        fn with_failing_polls(statuses: Vec<JobStatus>, failing_polls: usize) -> Arc<Self> {
            Arc::new(Self {
                submit_error: None,
                statuses: Mutex::new(statuses.into()),
                submitted: Mutex::new(Vec::new()),
                polls: Mutex::new(0),
                failing_polls,
            })
        }

        fn failing_submit(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                submit_error: Some(reason.into()),
                statuses: Mutex::new(VecDeque::new()),
                submitted: Mutex::new(Vec::new()),
                polls: Mutex::new(0),
                failing_polls: 0,
            })
        }
    }

    #[async_trait]
    impl WarehouseClient for FakeWarehouse {
        async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle, WarehouseError> {
            if let Some(reason) = &self.submit_error {
                return Err(WarehouseError::Submit {
                    destination: request.destination.to_string(),
                    reason: reason.clone(),
                });
            }
            self.submitted.lock().unwrap().push(request.clone());
            Ok(JobHandle {
                project_id: request.destination.project_id.clone(),
                job_id: "job-1".into(),
                location: None,
            })
        }

        async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, WarehouseError> {
            let polls = {
                let mut polls = self.polls.lock().unwrap();
                *polls += 1;
                *polls
            };
            if polls <= self.failing_polls {
                return Err(WarehouseError::Poll {
                    job_id: handle.job_id.clone(),
                    reason: "503 Service Unavailable".into(),
                });
            }
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(statuses.front().cloned().unwrap_or(JobStatus::Running))
            }
        }
    }

    fn job() -> Job {
        Job {
            source: ObjectLocator::s3("src", "data/user.csv"),
            staging: ObjectLocator::gcs("tmp", "data/user.csv"),
            destination: TableRef {
                project_id: "p".into(),
                dataset: "d".into(),
                table: "user".into(),
            },
            options: LoadOptions::new(SourceFormat::Csv),
        }
    }

    fn config(timeout_seconds: u64) -> LoaderConfig {
        LoaderConfig {
            poll_interval_ms: 100,
            max_poll_interval_ms: 1_000,
            timeout_seconds,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_done() {
        let fake = FakeWarehouse::new(vec![
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Done { error: None },
        ]);
        let loader = Loader::new(fake.clone(), &config(60));

        let handle = loader.load(&job()).await.unwrap();
        assert_eq!(handle.job_id, "job-1");
        assert_eq!(*fake.polls.lock().unwrap(), 3);

        let submitted = fake.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].source_uris, vec!["gs://tmp/data/user.csv".to_string()]);
        assert_eq!(submitted[0].destination.table, "user");
    }

    #[tokio::test(start_paused = true)]
    async fn job_error_is_job_failed() {
        let fake = FakeWarehouse::new(vec![JobStatus::Done {
            error: Some("invalid: bad row".into()),
        }]);
        let loader = Loader::new(fake, &config(60));
        let err = loader.load(&job()).await.unwrap_err();
        match err {
            WarehouseError::JobFailed { job_id, reason } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(reason, "invalid: bad row");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_job_times_out() {
        let fake = FakeWarehouse::new(vec![JobStatus::Running]);
        let loader = Loader::new(fake.clone(), &config(5));
        let err = loader.load(&job()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Timeout { seconds: 5, .. }));
        assert!(*fake.polls.lock().unwrap() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_error_keeps_waiting() {
        let fake = FakeWarehouse::with_failing_polls(vec![JobStatus::Done { error: None }], 1);
        let loader = Loader::new(fake.clone(), &config(60));

        let handle = loader.load(&job()).await.unwrap();
        assert_eq!(handle.job_id, "job-1");
        assert_eq!(*fake.polls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_poll_errors_give_up() {
        let fake = FakeWarehouse::with_failing_polls(vec![JobStatus::Done { error: None }], 100);
        let loader = Loader::new(fake.clone(), &config(600));

        let err = loader.load(&job()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Poll { .. }));
        assert_eq!(*fake.polls.lock().unwrap(), MAX_POLL_ERRORS as usize);
    }

    #[tokio::test]
    async fn submit_error_skips_polling() {
        let fake = FakeWarehouse::failing_submit("dataset not found");
        let loader = Loader::new(fake.clone(), &config(60));
        let err = loader.load(&job()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Submit { .. }));
        assert_eq!(*fake.polls.lock().unwrap(), 0);
    }
}
