use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::ArtifactStore;
use crate::artifact::BlobMeta;
use crate::error::{Error, Result};

type Blobs = BTreeMap<(String, String), Vec<u8>>;

/// Store en memoria, para tests y demos locales.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<Blobs>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, Blobs> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nombres de todos los blobs de un bucket (ordenados).
    pub fn names(&self, bucket: &str) -> Vec<String> {
        self.blobs()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobMeta>> {
        Ok(self
            .blobs()
            .iter()
            .filter(|((b, name), _)| b == bucket && name.starts_with(prefix))
            .map(|((_, name), bytes)| BlobMeta {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.blobs()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| Error::store(format!("no existe {}/{}", bucket, path)))
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs()
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(())
    }

    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()> {
        let mut blobs = self.blobs();
        let bytes = blobs
            .get(&(bucket.to_string(), src.to_string()))
            .cloned()
            .ok_or_else(|| Error::store(format!("no existe {}/{}", bucket, src)))?;
        blobs.insert((bucket.to_string(), dst.to_string()), bytes);
        Ok(())
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        self.blobs()
            .remove(&(bucket.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::store(format!("no existe {}/{}", bucket, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_filtra_por_bucket_y_prefijo() {
        let store = MemoryArtifactStore::new();
        store.put("a", "dir/x.jsonl", b"1".to_vec()).await.unwrap();
        store.put("a", "dir/sub/y.jsonl", b"22".to_vec()).await.unwrap();
        store.put("a", "otro/z.jsonl", b"3".to_vec()).await.unwrap();
        store.put("b", "dir/x.jsonl", b"4".to_vec()).await.unwrap();

        let listed = store.list("a", "dir/").await.unwrap();
        let names: Vec<_> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["dir/sub/y.jsonl", "dir/x.jsonl"]);
        assert_eq!(listed[0].size, 2);

        assert!(store.exists("b", "dir").await.unwrap());
        assert!(!store.exists("b", "otro").await.unwrap());
    }

    #[tokio::test]
    async fn copy_y_delete() {
        let store = MemoryArtifactStore::new();
        store.put("a", "src", b"data".to_vec()).await.unwrap();
        store.copy("a", "src", "dst").await.unwrap();
        store.delete("a", "src").await.unwrap();

        assert_eq!(store.get("a", "dst").await.unwrap(), b"data".to_vec());
        assert!(store.get("a", "src").await.is_err());
        assert!(store.delete("a", "src").await.is_err());
    }
}
