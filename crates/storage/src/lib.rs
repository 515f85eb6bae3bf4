//! Object stores and the source → staging copy.
//!
//! - [`backend`]: per-bucket `ObjectStore` clients for S3 and GCS, built lazily
//! - [`transporter`]: streams one object between stores
//! - [`staging`]: owns a staged copy until it is cleaned up

pub mod backend;
pub mod error;
pub mod staging;
pub mod transporter;

pub use backend::{CloudStores, MemoryStores, StoreProvider};
pub use error::StorageError;
pub use staging::StagingHandle;
pub use transporter::Transporter;
