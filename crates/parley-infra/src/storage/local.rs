//! Local filesystem implementation of `FileStore`.
//!
//! Every path is resolved under a base directory; absolute paths and `..`
//! components are rejected before touching the disk.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use parley_core::storage::file_store::FileStore;
use parley_types::error::StorageError;

/// Text file store rooted at `base_dir`.
///
/// All operations go through `tokio::fs` for async I/O.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of `path` under the base directory.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(self.base_dir.join(relative))
    }
}

impl FileStore for LocalFileStore {
    async fn read(&self, path: &str) -> Result<String, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        tracing::debug!(path = %full.display(), bytes = content.len(), "file written");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.resolve(path)?;
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write("notes/a.md", "hello").await.unwrap();
        assert_eq!(store.read("notes/a.md").await.unwrap(), "hello");
        assert!(store.exists("notes/a.md").await.unwrap());
        assert!(dir.path().join("notes").join("a.md").exists());
    }

    #[tokio::test]
    async fn write_replaces_content() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.write("a.md", "first").await.unwrap();
        store.write("a.md", "second").await.unwrap();
        assert_eq!(store.read("a.md").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let err = store.read("nope.md").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(ref p) if p == "nope.md"));
        assert!(!store.exists("nope.md").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_sorted_and_tolerates_missing_dir() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(store.list("out").await.unwrap().is_empty());
        store.write("out/b.md", "b").await.unwrap();
        store.write("out/a.md", "a").await.unwrap();
        assert_eq!(store.list("out").await.unwrap(), vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn escaping_paths_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("root"));

        for path in ["../evil.md", "a/../../evil.md", "/etc/passwd"] {
            let err = store.write(path, "x").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidPath(_)), "{path} accepted");
        }
        assert!(!dir.path().join("evil.md").exists());
    }
}
