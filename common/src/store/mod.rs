//! Contrato del store de artefactos (blobs por bucket + ruta).
//!
//! Las operaciones deben ser seguras ante llamadas concurrentes sobre rutas
//! distintas; el pipeline no usa locks sobre el store.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::artifact::{Artifact, BlobMeta};
use crate::error::Result;

pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `true` si existe al menos un blob cuyo nombre empieza con `prefix`.
    async fn exists(&self, bucket: &str, prefix: &str) -> Result<bool> {
        Ok(!self.list(bucket, prefix).await?.is_empty())
    }

    /// Lista los blobs cuyo nombre empieza con `prefix`, ordenados por nombre.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobMeta>>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()>;

    async fn delete(&self, bucket: &str, path: &str) -> Result<()>;
}

/// Atajo: ¿hay algo bajo el artefacto?
pub async fn artifact_exists(store: &dyn ArtifactStore, artifact: &Artifact) -> Result<bool> {
    store.exists(&artifact.bucket, &artifact.presence_prefix()).await
}
