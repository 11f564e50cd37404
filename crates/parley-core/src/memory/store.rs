//! MemoryStore trait definition.
//!
//! Thread memory is a single text blob per thread: the rolling summary the
//! next request on the same thread starts from. Implementations live in
//! parley-infra (e.g., `FileMemoryStore`).

use std::future::Future;

use parley_types::error::StorageError;

/// Read/write access to per-thread context text.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait MemoryStore: Send + Sync {
    /// Stored context for the thread, or `None` if nothing was written yet.
    fn read(
        &self,
        thread_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Replace the thread's context.
    fn write(
        &self,
        thread_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
