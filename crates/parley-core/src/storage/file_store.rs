//! File store trait.
//!
//! Text blob storage addressed by relative, `/`-separated paths. Used for
//! thread memory and audit artifacts. Implementations live in parley-infra.

use std::future::Future;

use parley_types::error::StorageError;

/// Trait for text file storage rooted in a base location.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Paths are relative; implementations must reject paths that escape the
/// storage root with `StorageError::InvalidPath`.
pub trait FileStore: Send + Sync {
    /// Read a file. Missing files yield `StorageError::NotFound`.
    fn read(&self, path: &str) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Write a file, creating parent directories and replacing existing content.
    fn write(&self, path: &str, content: &str)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    fn exists(&self, path: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Names of the entries directly under `path`, sorted. A missing
    /// directory lists as empty.
    fn list(&self, path: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}
