use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::{Error, Result};

pub type JobId = String;

/// Estado de un job batch remoto. Terminales: Succeeded, Failed, Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Un job tal como lo ve el servicio batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJob {
    pub id: JobId,
    /// Cluster donde se ubica el job.
    pub cluster: String,
    pub program_uri: String,
    pub args: Vec<String>,
    pub state: JobState,
}

/* --------- Parámetros tipados de los programas --------- */

/// Proyección que aplica `merge_two_files` sobre el left join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKind {
    /// texto + caption de la imagen (si hay)
    CaptionText,
    /// metadatos + texto + sentimiento
    MetaText,
}

impl MergeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeKind::CaptionText => "caption_text",
            MergeKind::MetaText => "meta_text",
        }
    }
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "caption_text" => Ok(MergeKind::CaptionText),
            "meta_text" => Ok(MergeKind::MetaText),
            other => Err(Error::invalid_config(format!("merge desconocido: {other}"))),
        }
    }
}

/// Parámetros de un programa batch; se aplanan a `--flag valor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "snake_case")]
pub enum JobParams {
    /// Junta todos los shards de `{directory}/` en `{directory}/combined/`.
    MergeDirectory {
        bucket: String,
        directory: String,
        /// Si coincide con `bucket`, las filas ganan `image_path`.
        image_bucket: String,
    },
    /// Left join por `id` de dos artefactos canónicos.
    MergeTwo {
        directory: String,
        left_bucket: String,
        left_path: String,
        right_bucket: String,
        right_path: String,
        output_bucket: String,
        output_directory: String,
        merge: MergeKind,
    },
}

impl JobParams {
    pub fn to_args(&self) -> Vec<String> {
        let pairs: Vec<(&str, &str)> = match self {
            JobParams::MergeDirectory {
                bucket,
                directory,
                image_bucket,
            } => vec![
                ("--bucket_name", bucket),
                ("--directory", directory),
                ("--image_bucket_name", image_bucket),
            ],
            JobParams::MergeTwo {
                directory,
                left_bucket,
                left_path,
                right_bucket,
                right_path,
                output_bucket,
                output_directory,
                merge,
            } => vec![
                ("--bucket1", left_bucket),
                ("--bucket2", right_bucket),
                ("--date_directory", directory),
                ("--file1_path", left_path),
                ("--file2_path", right_path),
                ("--output_bucket", output_bucket),
                ("--output_directory", output_directory),
                ("--merge", merge.as_str()),
            ],
        };

        pairs
            .into_iter()
            .flat_map(|(k, v)| [k.to_string(), v.to_string()])
            .collect()
    }

    /// Inversa de `to_args`, usada por el lado que ejecuta el programa.
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() % 2 != 0 {
            return Err(Error::invalid_config(format!(
                "argumentos impares: {:?}",
                args
            )));
        }
        let flags: HashMap<&str, &str> = args
            .chunks(2)
            .map(|kv| (kv[0].as_str(), kv[1].as_str()))
            .collect();

        let get = |name: &str| -> Result<String> {
            flags
                .get(name)
                .map(|v| v.to_string())
                .ok_or_else(|| Error::invalid_config(format!("falta el argumento {name}")))
        };

        if flags.contains_key("--merge") {
            Ok(JobParams::MergeTwo {
                directory: get("--date_directory")?,
                left_bucket: get("--bucket1")?,
                left_path: get("--file1_path")?,
                right_bucket: get("--bucket2")?,
                right_path: get("--file2_path")?,
                output_bucket: get("--output_bucket")?,
                output_directory: get("--output_directory")?,
                merge: get("--merge")?.parse()?,
            })
        } else {
            Ok(JobParams::MergeDirectory {
                bucket: get("--bucket_name")?,
                directory: get("--directory")?,
                image_bucket: get("--image_bucket_name")?,
            })
        }
    }
}

/* --------- Descriptor de una etapa batch --------- */

/// Todo lo que el runner idempotente necesita para una etapa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub cluster: String,
    /// Programa publicado en el bucket de jobs.
    pub program: Artifact,
    /// Inputs que tienen que existir antes de enviar nada.
    pub inputs: Vec<Artifact>,
    /// Directorio de salida; cualquier blob debajo = etapa ya hecha.
    pub output: Artifact,
    /// Nombre final del único shard tras la limpieza.
    pub canonical_filename: String,
    pub params: JobParams,
}

/// Programa publicable en el bucket de jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estados_terminales() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Submitted.is_terminal());
    }

    #[test]
    fn merge_directory_genera_flags_en_orden() {
        let p = JobParams::MergeDirectory {
            bucket: "meta".into(),
            directory: "2024-01-10-2024-01-17".into(),
            image_bucket: "image".into(),
        };
        assert_eq!(
            p.to_args(),
            vec![
                "--bucket_name",
                "meta",
                "--directory",
                "2024-01-10-2024-01-17",
                "--image_bucket_name",
                "image"
            ]
        );
        assert_eq!(JobParams::from_args(&p.to_args()).unwrap(), p);
    }

    #[test]
    fn merge_two_lee_el_tipo_de_merge() {
        let p = JobParams::MergeTwo {
            directory: "d".into(),
            left_bucket: "text".into(),
            left_path: "combined/combined.jsonl".into(),
            right_bucket: "image".into(),
            right_path: "image_caption/image_caption.jsonl".into(),
            output_bucket: "text".into(),
            output_directory: "image_text".into(),
            merge: MergeKind::CaptionText,
        };
        let args = p.to_args();
        assert!(args.windows(2).any(|w| w[0] == "--merge" && w[1] == "caption_text"));
        assert_eq!(JobParams::from_args(&args).unwrap(), p);
    }

    #[test]
    fn from_args_sin_flag_obligatorio_falla() {
        let args: Vec<String> = vec!["--bucket_name".into(), "meta".into()];
        let err = JobParams::from_args(&args).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");

        let bad: Vec<String> = vec!["--merge".into()];
        assert!(JobParams::from_args(&bad).is_err());
    }
}
