//! `FileMemoryStore`: one `context.md` per thread.
//!
//! Layout under the store root:
//! ```text
//! {directory}/{thread_id}/context.md
//! ```
//!
//! Thread ids are percent-encoded into one path segment, so distinct ids
//! never share a context file.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use parley_core::memory::store::MemoryStore;
use parley_core::storage::file_store::FileStore;
use parley_types::error::StorageError;

const CONTEXT_FILE: &str = "context.md";

/// Everything but ASCII alphanumerics, `-` and `_` is escaped, `%` included.
const THREAD_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

#[derive(Debug, Clone)]
pub struct FileMemoryStore<F: FileStore> {
    files: F,
    directory: String,
}

impl<F: FileStore> FileMemoryStore<F> {
    pub fn new(files: F, directory: impl Into<String>) -> Self {
        Self {
            files,
            directory: directory.into(),
        }
    }

    /// Store path of the thread's context file.
    pub fn context_path(&self, thread_id: &str) -> Result<String, StorageError> {
        Ok(format!(
            "{}/{}/{CONTEXT_FILE}",
            self.directory.trim_end_matches('/'),
            thread_segment(thread_id)?
        ))
    }

    /// Threads with stored memory, sorted by their stored segment.
    pub async fn threads(&self) -> Result<Vec<String>, StorageError> {
        let segments = self.files.list(&self.directory).await?;
        Ok(segments
            .iter()
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .collect())
    }
}

/// Encode a thread id as one path segment; the mapping is injective.
fn thread_segment(thread_id: &str) -> Result<String, StorageError> {
    if thread_id.is_empty() {
        return Err(StorageError::InvalidPath("empty thread id".to_string()));
    }
    Ok(utf8_percent_encode(thread_id, THREAD_SEGMENT).to_string())
}

impl<F: FileStore> MemoryStore for FileMemoryStore<F> {
    async fn read(&self, thread_id: &str) -> Result<Option<String>, StorageError> {
        match self.files.read(&self.context_path(thread_id)?).await {
            Ok(text) => Ok(Some(text)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, thread_id: &str, text: &str) -> Result<(), StorageError> {
        let path = self.context_path(thread_id)?;
        self.files.write(&path, text).await?;
        tracing::debug!(thread = %thread_id, path = %path, "thread memory written");
        Ok(())
    }
}
