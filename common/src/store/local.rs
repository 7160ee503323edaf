use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::ArtifactStore;
use crate::artifact::BlobMeta;
use crate::error::{Error, Result};

/// Store sobre el filesystem local: cada bucket es un directorio bajo `root`
/// y cada blob un archivo con su ruta relativa.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resuelve (bucket, ruta) a un path, rechazando `..` y rutas absolutas.
    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut out = self.root.join(checked_segment(bucket)?);
        for component in Path::new(path).components() {
            match component {
                Component::Normal(seg) => out.push(seg),
                Component::CurDir => {}
                _ => return Err(Error::store(format!("ruta inválida: {}", path))),
            }
        }
        Ok(out)
    }
}

fn checked_segment(bucket: &str) -> Result<&str> {
    if bucket.is_empty() || bucket.contains('/') || bucket == ".." || bucket == "." {
        return Err(Error::store(format!("bucket inválido: {:?}", bucket)));
    }
    Ok(bucket)
}

/// Recorre `dir` recursivamente y junta (nombre relativo con '/', tamaño).
fn walk(base: &Path, dir: &Path, out: &mut Vec<BlobMeta>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let ft = entry.file_type()?;
        let path = entry.path();
        if ft.is_dir() {
            walk(base, &path, out)?;
        } else if ft.is_file() {
            let rel = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            out.push(BlobMeta {
                name: rel,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobMeta>> {
        let base = self.root.join(checked_segment(bucket)?);
        let prefix = prefix.to_string();

        let listed = tokio::task::spawn_blocking(move || -> io::Result<Vec<BlobMeta>> {
            let mut out = Vec::new();
            if base.is_dir() {
                walk(&base, &base, &mut out)?;
            }
            out.retain(|b| b.name.starts_with(&prefix));
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
        .await
        .map_err(|e| Error::store(format!("listado interrumpido: {e}")))??;

        Ok(listed)
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let file = self.resolve(bucket, path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| Error::store(format!("no se pudo leer {}/{}: {e}", bucket, path)))
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        let file = self.resolve(bucket, path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, bytes).await?;
        Ok(())
    }

    async fn copy(&self, bucket: &str, src: &str, dst: &str) -> Result<()> {
        let from = self.resolve(bucket, src)?;
        let to = self.resolve(bucket, dst)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|e| Error::store(format!("no se pudo copiar {} -> {}: {e}", src, dst)))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        let file = self.resolve(bucket, path)?;
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| Error::store(format!("no se pudo borrar {}/{}: {e}", bucket, path)))
    }
}
