//! Los dos programas batch de merge, ejecutados sobre el store.
//!
//! Escriben como lo haría un motor distribuido: un shard
//! `part-00000-<uuid>.jsonl` más el marcador `_SUCCESS` bajo el directorio
//! de salida. La limpieza posterior deja un único archivo canónico.

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::{join_key, leaf_name};
use crate::cleanup::is_marker;
use crate::config::JobsConfig;
use crate::engine::{merge_two, parse_jsonl, to_jsonl, with_image_paths, Records};
use crate::error::Result;
use crate::job::{JobParams, ProgramFile};
use crate::pipeline::COMBINED_DIR;
use crate::store::ArtifactStore;

pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Descriptores de los programas que se publican en el bucket de jobs.
pub fn builtin_programs(jobs: &JobsConfig) -> Vec<ProgramFile> {
    [
        (&jobs.merge_files, "merge_directory"),
        (&jobs.merge_two_files, "merge_two"),
    ]
    .into_iter()
    .map(|(name, program)| ProgramFile {
        name: name.clone(),
        bytes: json!({ "program": program }).to_string().into_bytes(),
    })
    .collect()
}

/// Corre el programa que corresponde a `params`. Devuelve las filas escritas.
pub async fn run_program(store: &dyn ArtifactStore, params: &JobParams) -> Result<usize> {
    match params {
        JobParams::MergeDirectory {
            bucket,
            directory,
            image_bucket,
        } => merge_directory(store, bucket, directory, bucket == image_bucket).await,
        JobParams::MergeTwo {
            directory,
            left_bucket,
            left_path,
            right_bucket,
            right_path,
            output_bucket,
            output_directory,
            merge,
        } => {
            let left_key = join_key(&[directory.as_str(), left_path.as_str()]);
            let right_key = join_key(&[directory.as_str(), right_path.as_str()]);
            let left = read_records(store, left_bucket, &left_key).await?;
            let right = read_records(store, right_bucket, &right_key).await?;
            let merged = merge_two(left, right, *merge);
            let out_dir = join_key(&[directory.as_str(), output_directory.as_str()]);
            write_output(store, output_bucket, &out_dir, &merged).await?;
            info!(%merge, output = %out_dir, rows = merged.len(), "merge de dos archivos listo");
            Ok(merged.len())
        }
    }
}

/// Concatena los shards que están directamente bajo `{directory}/`.
async fn merge_directory(
    store: &dyn ArtifactStore,
    bucket: &str,
    directory: &str,
    with_images: bool,
) -> Result<usize> {
    let prefix = format!("{}/", directory);
    let mut records: Records = Vec::new();

    for blob in store.list(bucket, &prefix).await? {
        let rest = &blob.name[prefix.len()..];
        // sólo hijos directos; nada de combined/ ni images/
        if rest.contains('/') || is_marker(leaf_name(rest)) || !rest.ends_with(".jsonl") {
            continue;
        }
        debug!(bucket, shard = %blob.name, "leyendo shard");
        records.extend(read_records(store, bucket, &blob.name).await?);
    }

    if with_images {
        records = with_image_paths(records, directory);
    }

    let out_dir = join_key(&[directory, COMBINED_DIR]);
    write_output(store, bucket, &out_dir, &records).await?;
    info!(bucket, directory, rows = records.len(), "merge de directorio listo");
    Ok(records.len())
}

async fn read_records(store: &dyn ArtifactStore, bucket: &str, key: &str) -> Result<Records> {
    parse_jsonl(&store.get(bucket, key).await?)
}

async fn write_output(
    store: &dyn ArtifactStore,
    bucket: &str,
    out_dir: &str,
    records: &[serde_json::Value],
) -> Result<()> {
    let part = format!("part-00000-{}.jsonl", Uuid::new_v4());
    store
        .put(bucket, &join_key(&[out_dir, part.as_str()]), to_jsonl(records)?)
        .await?;
    store
        .put(bucket, &join_key(&[out_dir, SUCCESS_MARKER]), Vec::new())
        .await
}
