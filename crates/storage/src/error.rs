use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Source object could not be opened or read.
    #[error("read {locator} failed: {source}")]
    Read {
        locator: String,
        #[source]
        source: object_store::Error,
    },

    /// Staging object could not be written.
    #[error("write {locator} failed: {source}")]
    Write {
        locator: String,
        #[source]
        source: object_store::Error,
    },

    #[error("delete {locator} failed: {source}")]
    Delete {
        locator: String,
        #[source]
        source: object_store::Error,
    },

    /// Building a store client failed.
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}
