use thiserror::Error;

/// Errors from the snapshot storage layer.
///
/// Only construction surfaces these directly; once a store exists, I/O
/// failures are caught at the component boundary, logged, and reported as
/// boolean/optional results (see `SnapshotStore`).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create snapshot directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("failed to write snapshot: {0}")]
    Write(#[source] image::ImageError),

    #[error("failed to read snapshot: {0}")]
    Read(#[source] image::ImageError),

    #[error("failed to remove snapshot file: {0}")]
    Remove(#[source] std::io::Error),
}
