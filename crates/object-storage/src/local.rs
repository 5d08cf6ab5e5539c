//! Local filesystem object store.

use crate::{ObjectStore, PutOutcome, Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Object store rooted at a local directory. Keys map to relative paths.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::io(path.display().to_string(), e))
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<PutOutcome> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(PutOutcome::AlreadyExists),
            Err(e) => return Err(StorageError::io(path.display().to_string(), e)),
        };

        file.write_all(&data)
            .await
            .map_err(|e| StorageError::io(path.display().to_string(), e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io(path.display().to_string(), e))?;
        Ok(PutOutcome::Created)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path.display().to_string(), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(dir.display().to_string(), e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(dir.display().to_string(), e))?
            {
                let entry_path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io(entry_path.display().to_string(), e))?;

                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if let Some(key) = self.key_for(&entry_path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        tracing::debug!(
            "Listed {} files under {}/{}",
            keys.len(),
            self.root.display(),
            prefix
        );
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path.display().to_string(), e)),
        }
    }
}

impl LocalStore {
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .put("table/_delta_log/00000000000000000000.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let data = store
            .get("table/_delta_log/00000000000000000000.json")
            .await
            .unwrap();
        assert_eq!(data, Some(Bytes::from_static(b"{}")));
        assert_eq!(store.get("table/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let first = store.put_if_absent("a/b", Bytes::from_static(b"1")).await.unwrap();
        let second = store.put_if_absent("a/b", Bytes::from_static(b"2")).await.unwrap();

        assert_eq!(first, PutOutcome::Created);
        assert_eq!(second, PutOutcome::AlreadyExists);
        assert_eq!(store.get("a/b").await.unwrap(), Some(Bytes::from_static(b"1")));
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        for key in ["t/_delta_log/2.json", "t/_delta_log/0.json", "t/part-0.parquet", "u/x"] {
            store.put(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let keys = store.list("t/_delta_log/").await.unwrap();
        assert_eq!(keys, vec!["t/_delta_log/0.json", "t/_delta_log/2.json"]);

        let all = store.list("").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("nope"));
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("c/offsets/1", Bytes::from_static(b"x")).await.unwrap();

        store.delete("c/offsets/1").await.unwrap();
        store.delete("c/offsets/1").await.unwrap();

        assert_eq!(store.get("c/offsets/1").await.unwrap(), None);
        assert!(store.list("c/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.put("../escape", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
