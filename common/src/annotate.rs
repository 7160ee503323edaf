//! Enriquecimiento con modelos: caption de imágenes y sentimiento del texto.
//! Una falla por ítem degrada a un valor vacío; nunca aborta el lote.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::engine::{parse_jsonl, to_jsonl, Records};
use crate::error::{Error, Result};
use crate::services::{InferenceError, InferenceService};
use crate::store::ArtifactStore;

/// Largo máximo del texto que se manda al modelo de sentimiento.
pub const MAX_SENTIMENT_CHARS: usize = 120;
pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Caption,
    Sentiment,
}

impl Annotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Annotation::Caption => "caption",
            Annotation::Sentiment => "sentiment",
        }
    }

    pub fn input_field(&self) -> &'static str {
        match self {
            Annotation::Caption => "image_path",
            Annotation::Sentiment => "text",
        }
    }

    pub fn output_field(&self) -> &'static str {
        match self {
            Annotation::Caption => "image_caption",
            Annotation::Sentiment => "sentiment",
        }
    }

    fn prepare(&self, rec: &Value) -> String {
        let raw = rec
            .get(self.input_field())
            .and_then(|v| v.as_str())
            .unwrap_or("");
        match self {
            Annotation::Caption => raw.to_string(),
            Annotation::Sentiment => raw.chars().take(MAX_SENTIMENT_CHARS).collect(),
        }
    }

    fn value_for(&self, out: &std::result::Result<String, InferenceError>) -> Value {
        match (self, out) {
            (Annotation::Caption, Ok(caption)) => json!(caption),
            (Annotation::Caption, Err(_)) => json!(""),
            (Annotation::Sentiment, Ok(label)) => {
                sentiment_score(label).map(Value::from).unwrap_or(Value::Null)
            }
            (Annotation::Sentiment, Err(_)) => Value::Null,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Annotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "caption" => Ok(Annotation::Caption),
            "sentiment" => Ok(Annotation::Sentiment),
            other => Err(Error::invalid_config(format!("anotación desconocida: {other}"))),
        }
    }
}

/// POS -> 1, NEU -> 0, NEG -> -1.
pub fn sentiment_score(label: &str) -> Option<i64> {
    match label.trim().to_ascii_uppercase().as_str() {
        "POS" => Some(1),
        "NEU" => Some(0),
        "NEG" => Some(-1),
        _ => None,
    }
}

/// Agrega la columna de salida a cada registro, llamando al modelo por lotes.
/// Devuelve los registros y la cantidad de ítems que fallaron.
pub async fn annotate_records(
    service: &dyn InferenceService,
    annotation: Annotation,
    mut records: Records,
    batch_size: usize,
) -> (Records, usize) {
    let mut failures = 0;

    for chunk in records.chunks_mut(batch_size.max(1)) {
        let inputs: Vec<String> = chunk.iter().map(|r| annotation.prepare(r)).collect();
        let outputs = service.infer(&inputs).await;

        for (i, rec) in chunk.iter_mut().enumerate() {
            let out = outputs
                .get(i)
                .cloned()
                .unwrap_or_else(|| Err(InferenceError::Failed("sin salida".into())));
            if let Err(e) = &out {
                failures += 1;
                warn!(annotation = %annotation, error = %e, "falla de inferencia, valor vacío");
            }
            if let Some(obj) = rec.as_object_mut() {
                obj.insert(annotation.output_field().to_string(), annotation.value_for(&out));
            }
        }
    }

    (records, failures)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotateOutcome {
    Skipped,
    Written { rows: usize, failures: usize },
}

/// Lee `input`, lo anota y lo escribe en `output`. Si `output` ya existe no
/// hace nada.
pub async fn annotate_artifact(
    store: &dyn ArtifactStore,
    service: &dyn InferenceService,
    annotation: Annotation,
    input: &Artifact,
    output: &Artifact,
    batch_size: usize,
) -> Result<AnnotateOutcome> {
    if store.exists(&output.bucket, &output.key()).await? {
        info!(output = %output, "anotación ya hecha, se omite");
        return Ok(AnnotateOutcome::Skipped);
    }
    if !store.exists(&input.bucket, &input.key()).await? {
        return Err(Error::MissingInput {
            path: input.to_string(),
        });
    }

    let records = parse_jsonl(&store.get(&input.bucket, &input.key()).await?)?;
    let (records, failures) = annotate_records(service, annotation, records, batch_size).await;
    let rows = records.len();

    store
        .put(&output.bucket, &output.key(), to_jsonl(&records)?)
        .await?;
    info!(output = %output, rows, failures, annotation = %annotation, "anotación escrita");

    Ok(AnnotateOutcome::Written { rows, failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Devuelve la entrada en mayúsculas, salvo las que contienen "falla".
    struct Echo {
        seen: Mutex<Vec<Vec<String>>>,
        label: Option<&'static str>,
    }

    #[async_trait]
    impl InferenceService for Echo {
        async fn infer(
            &self,
            inputs: &[String],
        ) -> Vec<std::result::Result<String, InferenceError>> {
            self.seen.lock().unwrap().push(inputs.to_vec());
            inputs
                .iter()
                .map(|i| {
                    if i.contains("falla") {
                        Err(InferenceError::Timeout)
                    } else {
                        Ok(self.label.map(str::to_string).unwrap_or_else(|| i.to_uppercase()))
                    }
                })
                .collect()
        }
    }

    #[test]
    fn sentiment_score_mapea_etiquetas() {
        assert_eq!(sentiment_score("POS"), Some(1));
        assert_eq!(sentiment_score("NEU"), Some(0));
        assert_eq!(sentiment_score("neg"), Some(-1));
        assert_eq!(sentiment_score("???"), None);
    }

    #[tokio::test]
    async fn caption_fallido_queda_vacio() {
        let svc = Echo {
            seen: Mutex::new(Vec::new()),
            label: None,
        };
        let recs = vec![
            json!({"id": "1", "image_path": "d/images/a.jpg"}),
            json!({"id": "2", "image_path": "d/images/falla.jpg"}),
            json!({"id": "3", "image_path": "d/images/c.jpg"}),
        ];

        let (out, failures) = annotate_records(&svc, Annotation::Caption, recs, 2).await;

        assert_eq!(failures, 1);
        assert_eq!(out[0]["image_caption"], json!("D/IMAGES/A.JPG"));
        assert_eq!(out[1]["image_caption"], json!(""));
        assert_eq!(svc.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sentimiento_trunca_a_120_caracteres() {
        let svc = Echo {
            seen: Mutex::new(Vec::new()),
            label: Some("POS"),
        };
        let largo = "x".repeat(300);
        let recs = vec![json!({"id": "1", "text": largo}), json!({"id": "2", "text": null})];

        let (out, failures) = annotate_records(&svc, Annotation::Sentiment, recs, 32).await;

        assert_eq!(failures, 0);
        assert_eq!(out[0]["sentiment"], json!(1));
        let seen = svc.seen.lock().unwrap();
        assert_eq!(seen[0][0].chars().count(), MAX_SENTIMENT_CHARS);
        assert_eq!(seen[0][1], "");
    }

    #[tokio::test]
    async fn annotate_artifact_omite_si_la_salida_existe() {
        let store = MemoryArtifactStore::new();
        let svc = Echo {
            seen: Mutex::new(Vec::new()),
            label: Some("NEG"),
        };
        let input = Artifact::new("text", "d", "image_text/image_text.jsonl");
        let output = Artifact::new("text", "d", "image_text_sentiment/image_text_sentiment.jsonl");

        let err = annotate_artifact(&store, &svc, Annotation::Sentiment, &input, &output, 8)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MissingInput");

        store
            .put("text", &input.key(), b"{\"id\":\"1\",\"text\":\"hola\"}\n".to_vec())
            .await
            .unwrap();
        let first = annotate_artifact(&store, &svc, Annotation::Sentiment, &input, &output, 8)
            .await
            .unwrap();
        assert_eq!(first, AnnotateOutcome::Written { rows: 1, failures: 0 });

        let written = parse_jsonl(&store.get("text", &output.key()).await.unwrap()).unwrap();
        assert_eq!(written[0]["sentiment"], json!(-1));

        let second = annotate_artifact(&store, &svc, Annotation::Sentiment, &input, &output, 8)
            .await
            .unwrap();
        assert_eq!(second, AnnotateOutcome::Skipped);
        assert_eq!(svc.seen.lock().unwrap().len(), 1);
    }
}
