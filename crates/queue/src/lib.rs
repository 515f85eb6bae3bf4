pub mod backoff;
pub mod consumer;
pub mod error;
pub mod parser;
pub mod receipt;
pub mod receiver;
pub mod sqs;

pub use backoff::BackoffPolicy;
pub use consumer::{QueueMessage, QueueService};
pub use error::QueueError;
pub use parser::{decode_key, parse_locators, S3Event};
pub use receipt::ReceiptHandle;
pub use receiver::{Delivery, Receiver};
pub use sqs::SqsQueue;
