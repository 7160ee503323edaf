use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::artifact::{join_key, leaf_name, parent_key};
use crate::error::{Error, Result};
use crate::store::ArtifactStore;

/// Prefijo reservado de los blobs marcadores (`_SUCCESS`, `_FAILURE`, ...).
pub const MARKER_PREFIX: char = '_';

pub fn is_marker(leaf: &str) -> bool {
    leaf.starts_with(MARKER_PREFIX)
}

/// Lo que hizo una pasada de limpieza.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_markers: Vec<String>,
    /// Ruta final del shard, si había alguno.
    pub canonical: Option<String>,
}

/// Colapsa la salida de un job (shards + marcadores) en un único blob con
/// nombre canónico.
#[derive(Clone)]
pub struct CleanupNormalizer {
    store: Arc<dyn ArtifactStore>,
}

impl CleanupNormalizer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Borra los marcadores y renombra el shard de datos a `canonical`
    /// (en su mismo directorio). Con más de un shard falla con
    /// `AmbiguousShards` sin haber tocado nada.
    pub async fn normalize(
        &self,
        bucket: &str,
        prefix: &str,
        canonical: &str,
    ) -> Result<CleanupReport> {
        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };

        let blobs = self.store.list(bucket, &prefix).await?;

        let mut markers = Vec::new();
        let mut shards = Vec::new();
        for blob in blobs {
            let leaf = leaf_name(&blob.name);
            if leaf.is_empty() {
                continue;
            }
            if is_marker(leaf) {
                markers.push(blob.name);
            } else {
                shards.push(blob.name);
            }
        }

        if shards.len() > 1 {
            return Err(Error::AmbiguousShards {
                prefix: format!("{}/{}", bucket, prefix),
                count: shards.len(),
            });
        }

        let mut report = CleanupReport::default();

        for marker in markers {
            debug!(bucket, blob = %marker, "borrando marcador");
            self.store.delete(bucket, &marker).await?;
            report.deleted_markers.push(marker);
        }

        let Some(shard) = shards.pop() else {
            warn!(bucket, prefix = %prefix, "no hay shard de datos para normalizar");
            return Ok(report);
        };

        if leaf_name(&shard) == canonical {
            debug!(bucket, blob = %shard, "el shard ya tiene el nombre canónico");
            report.canonical = Some(shard);
            return Ok(report);
        }

        let target = join_key(&[parent_key(&shard), canonical]);
        info!(bucket, from = %shard, to = %target, "renombrando shard");
        self.store.copy(bucket, &shard, &target).await?;
        self.store.delete(bucket, &shard).await?;

        report.canonical = Some(target);
        Ok(report)
    }
}
