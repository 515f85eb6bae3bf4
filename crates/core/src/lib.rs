pub mod config;
pub mod error;
pub mod job;
pub mod locator;

pub use config::Config;
pub use error::{ConfigError, LocatorError};
pub use job::{
    Compression, CreateDisposition, Job, LoadOptions, SourceFormat, TableRef, WriteDisposition,
};
pub use locator::{ObjectLocator, GCS_SCHEME, S3_SCHEME};
