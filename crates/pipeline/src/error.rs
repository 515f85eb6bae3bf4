//! Pipeline errors and their classification.

use std::fmt;

use thiserror::Error;

use ferry_core::ConfigError;
use ferry_queue::QueueError;
use ferry_rules::RuleError;
use ferry_storage::StorageError;
use ferry_warehouse::WarehouseError;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoMessage,
    Receive,
    Parse,
    Transport,
    Load,
    Cleanup,
    AcknowledgeMaxRetry,
    Cancelled,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NoMessage => "no_message",
            ErrorKind::Receive => "receive",
            ErrorKind::Parse => "parse",
            ErrorKind::Transport => "transport",
            ErrorKind::Load => "load",
            ErrorKind::Cleanup => "cleanup",
            ErrorKind::AcknowledgeMaxRetry => "acknowledge_max_retry",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("receive failed: {0}")]
    Receive(#[source] QueueError),

    #[error("message {message_id}: {source}")]
    Parse {
        message_id: String,
        #[source]
        source: QueueError,
    },

    #[error("transport {locator} failed: {source}")]
    Transport {
        locator: String,
        #[source]
        source: StorageError,
    },

    #[error("load into {destination} failed: {source}")]
    Load {
        destination: String,
        #[source]
        source: WarehouseError,
    },

    #[error("cleanup {locator} failed: {source}")]
    Cleanup {
        locator: String,
        #[source]
        source: StorageError,
    },

    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] QueueError),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error("setup failed: {0}")]
    Setup(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Receive(QueueError::NoMessage) => ErrorKind::NoMessage,
            PipelineError::Receive(QueueError::Cancelled)
            | PipelineError::Acknowledge(QueueError::Cancelled)
            | PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Receive(_) => ErrorKind::Receive,
            PipelineError::Parse { .. } => ErrorKind::Parse,
            PipelineError::Transport { .. } => ErrorKind::Transport,
            PipelineError::Load { .. } => ErrorKind::Load,
            PipelineError::Cleanup { .. } => ErrorKind::Cleanup,
            PipelineError::Acknowledge(_) => ErrorKind::AcknowledgeMaxRetry,
            PipelineError::Config(_) | PipelineError::Rules(_) | PipelineError::Setup(_) => {
                ErrorKind::Config
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Receive(other),
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::Setup(err.to_string())
    }
}

impl From<WarehouseError> for PipelineError {
    fn from(err: WarehouseError) -> Self {
        PipelineError::Setup(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_errors_classify() {
        assert_eq!(
            PipelineError::Receive(QueueError::NoMessage).kind(),
            ErrorKind::NoMessage
        );
        assert_eq!(PipelineError::from(QueueError::Cancelled).kind(), ErrorKind::Cancelled);
        assert_eq!(
            PipelineError::from(QueueError::Connection("reset".into())).kind(),
            ErrorKind::Receive
        );
        let max_retry = PipelineError::Acknowledge(QueueError::MaxRetry {
            message_id: "m".into(),
            attempts: 6,
            last_error: "boom".into(),
        });
        assert_eq!(max_retry.kind(), ErrorKind::AcknowledgeMaxRetry);
        assert!(PipelineError::Acknowledge(QueueError::Cancelled).is_cancelled());
    }

    #[test]
    fn load_error_carries_destination() {
        let err = PipelineError::Load {
            destination: "p.d.t".into(),
            source: WarehouseError::JobFailed {
                job_id: "j".into(),
                reason: "bad row".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Load);
        assert_eq!(err.to_string(), "load into p.d.t failed: load job j failed: bad row");
    }
}
