//! Prefix-scoped view over another object store.

use crate::{join_key, ObjectStore, PutOutcome, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Prefixes every key with a fixed path before delegating.
///
/// Listed keys are returned relative to the prefix.
#[derive(Clone)]
pub struct Scoped {
    inner: Arc<dyn ObjectStore>,
    prefix: String,
}

impl Scoped {
    pub fn new(inner: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self { inner, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }
}

impl std::fmt::Debug for Scoped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scoped").field("prefix", &self.prefix).finish()
    }
}

#[async_trait]
impl ObjectStore for Scoped {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.inner.put(&self.full_key(key), data).await
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<PutOutcome> {
        self.inner.put_if_absent(&self.full_key(key), data).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.inner.get(&self.full_key(key)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = join_key(&self.prefix, "");
        let keys = self.inner.list(&self.full_key(prefix)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&base).map(str::to_string))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(&self.full_key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scoped_keys_are_prefixed() {
        let dir = TempDir::new().unwrap();
        let root: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let table = Scoped::new(root.clone(), "products_delta/");

        table
            .put("_delta_log/00000000000000000000.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert!(root
            .get("products_delta/_delta_log/00000000000000000000.json")
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            table.list("_delta_log/").await.unwrap(),
            vec!["_delta_log/00000000000000000000.json"]
        );
    }

    #[tokio::test]
    async fn test_sibling_prefixes_do_not_leak() {
        let dir = TempDir::new().unwrap();
        let root: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        root.put("products_delta_old/x", Bytes::new()).await.unwrap();
        root.put("products_delta/y", Bytes::new()).await.unwrap();

        let table = Scoped::new(root, "products_delta");
        assert_eq!(table.list("").await.unwrap(), vec!["y"]);
    }

    #[tokio::test]
    async fn test_delete_stays_inside_prefix() {
        let dir = TempDir::new().unwrap();
        let root: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        root.put("checkpoint/offsets/1", Bytes::new()).await.unwrap();
        root.put("offsets/1", Bytes::new()).await.unwrap();

        let checkpoint = Scoped::new(root.clone(), "checkpoint");
        checkpoint.delete("offsets/1").await.unwrap();

        assert!(root.get("checkpoint/offsets/1").await.unwrap().is_none());
        assert!(root.get("offsets/1").await.unwrap().is_some());
    }
}
