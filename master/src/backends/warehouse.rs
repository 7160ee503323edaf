// master/src/backends/warehouse.rs

use async_trait::async_trait;
use common::artifact::parse_uri;
use common::engine::{parse_jsonl, records_to_csv};
use common::error::{Error, Result};
use common::services::{ExtractFormat, LoadFormat, QueryEngine, WarehouseLoader};
use common::store::ArtifactStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Warehouse de archivos: una tabla = `{root}/{dataset}/{table}.jsonl`.
pub struct LocalWarehouse {
    store: Arc<dyn ArtifactStore>,
    root: PathBuf,
}

fn warehouse_err(message: impl Into<String>) -> Error {
    Error::Warehouse {
        message: message.into(),
    }
}

impl LocalWarehouse {
    pub fn new(store: Arc<dyn ArtifactStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    fn table_path(&self, dataset: &str, table: &str) -> PathBuf {
        self.root.join(dataset).join(format!("{}.jsonl", table))
    }

    /// `proyecto.dataset.tabla` o `dataset.tabla`.
    fn split_table<'a>(&self, qualified: &'a str) -> Result<(&'a str, &'a str)> {
        let parts: Vec<&str> = qualified.split('.').collect();
        match parts.as_slice() {
            [.., dataset, table] if !dataset.is_empty() && !table.is_empty() => {
                Ok((*dataset, *table))
            }
            _ => Err(warehouse_err(format!("tabla inválida: {}", qualified))),
        }
    }
}

#[async_trait]
impl WarehouseLoader for LocalWarehouse {
    async fn load(
        &self,
        dataset: &str,
        table: &str,
        source_uri: &str,
        _format: LoadFormat,
    ) -> Result<()> {
        let (bucket, key) = parse_uri(source_uri)
            .ok_or_else(|| warehouse_err(format!("uri inválida: {}", source_uri)))?;
        let bytes = self.store.get(bucket, key).await?;

        let path = self.table_path(dataset, table);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        info!("tabla {}.{} cargada desde {}", dataset, table, source_uri);
        Ok(())
    }
}

#[async_trait]
impl QueryEngine for LocalWarehouse {
    async fn run(&self, _sql: &str, destination_table: &str) -> Result<()> {
        Err(Error::Query {
            message: format!(
                "el warehouse local no ejecuta SQL (destino {})",
                destination_table
            ),
        })
    }

    async fn extract(
        &self,
        table: &str,
        destination_uri: &str,
        _format: ExtractFormat,
    ) -> Result<()> {
        let (dataset, name) = self.split_table(table)?;
        let path = self.table_path(dataset, name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| warehouse_err(format!("no existe la tabla {}: {}", table, e)))?;

        let csv = records_to_csv(&parse_jsonl(&bytes)?)?;
        let (bucket, key) = parse_uri(destination_uri)
            .ok_or_else(|| warehouse_err(format!("uri inválida: {}", destination_uri)))?;
        self.store.put(bucket, key, csv).await?;
        info!("tabla {} exportada a {}", table, destination_uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryArtifactStore;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("warehouse-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn load_y_extract_a_csv() {
        let store = Arc::new(MemoryArtifactStore::new());
        store
            .put(
                "meta",
                "d/meta_text_merge/meta_text.jsonl",
                b"{\"id\":\"a\",\"score\":3}\n{\"id\":\"b\",\"score\":1}\n".to_vec(),
            )
            .await
            .unwrap();

        let root = temp_dir("load");
        let wh = LocalWarehouse::new(store.clone(), &root);
        wh.load(
            "reddit",
            "d",
            "store://meta/d/meta_text_merge/meta_text.jsonl",
            LoadFormat::Columnar,
        )
        .await
        .unwrap();
        assert!(root.join("reddit").join("d.jsonl").is_file());

        wh.extract("proj.reddit.d", "store://report/d/todo.csv", ExtractFormat::Csv)
            .await
            .unwrap();
        let csv = String::from_utf8(store.get("report", "d/todo.csv").await.unwrap()).unwrap();
        assert_eq!(csv, "id,score\na,3\nb,1\n");

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn sql_no_soportado() {
        let wh = LocalWarehouse::new(Arc::new(MemoryArtifactStore::new()), temp_dir("sql"));
        let err = wh.run("SELECT 1", "proj.reddit.x").await.unwrap_err();
        assert_eq!(err.kind(), "Query");
    }
}
