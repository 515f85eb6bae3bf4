//! The receive loop around [`Orchestrator::run_one_cycle`] and its shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, Result};
use crate::orchestrator::{CycleOutcome, Orchestrator};

const LIVENESS_POLL: Duration = Duration::from_millis(500);

/// Pause after a failed receive before polling the queue again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Pause after an empty receive. Long polling does most of the waiting.
const IDLE_DELAY: Duration = Duration::from_millis(200);

/// Loop policy.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Receive from this queue instead of the configured one.
    pub queue_name: Option<String>,
    /// Stop once the queue reports no message.
    pub exit_on_no_message: bool,
    /// Stop and return the error of the first failed cycle.
    pub exit_on_error: bool,
}

/// Counters for one [`Runner::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages: usize,
    pub loaded: usize,
    pub failures: usize,
}

/// Runs cycles until cancelled or a policy knob says stop.
pub struct Runner {
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
    running: Mutex<bool>,
}

impl Runner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            cancel: CancellationToken::new(),
            running: Mutex::new(false),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Loop until cancelled. Cancellation is checked between cycles, so an
    /// in-flight cycle always finishes first.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        if let Some(queue_name) = &options.queue_name {
            self.orchestrator.set_queue_name(queue_name).await;
        }
        *self.running.lock().await = true;
        info!(
            exit_on_no_message = options.exit_on_no_message,
            exit_on_error = options.exit_on_error,
            "Start running"
        );

        let result = self.run_loop(options).await;

        *self.running.lock().await = false;
        match &result {
            Ok(summary) => info!(
                messages = summary.messages,
                loaded = summary.loaded,
                failures = summary.failures,
                "Stopped"
            ),
            Err(e) => error!(error = %e, kind = %e.kind(), "Stopped on error"),
        }
        result
    }

    async fn run_loop(&self, options: &RunOptions) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        while !self.cancel.is_cancelled() {
            match self.orchestrator.run_one_cycle(&self.cancel).await {
                CycleOutcome::NoMessage => {
                    if options.exit_on_no_message {
                        info!("queue is empty");
                        break;
                    }
                    debug!("no message, polling again");
                    self.pause(IDLE_DELAY).await;
                }
                CycleOutcome::Success { loaded, .. } => {
                    summary.messages += 1;
                    summary.loaded += loaded;
                }
                CycleOutcome::PartialFailure(e) | CycleOutcome::Aborted(e) => {
                    if e.is_cancelled() {
                        break;
                    }
                    summary.messages += 1;
                    summary.failures += 1;
                    warn!(error = %e, kind = %e.kind(), "cycle failed, message left for redelivery");
                    if options.exit_on_error {
                        return Err(e);
                    }
                    if e.kind() == ErrorKind::Receive {
                        self.pause(RECEIVE_RETRY_DELAY).await;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Sleep unless cancelled first.
    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// Signal cancellation and wait up to `timeout` for the loop to stop.
    /// Returns whether it stopped in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        info!(timeout_secs = timeout.as_secs(), "Shutting down");
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_running().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("shutdown timed out with a cycle still running");
                return false;
            }
            tokio::time::sleep(LIVENESS_POLL).await;
        }
    }
}
