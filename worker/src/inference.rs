use async_trait::async_trait;
use common::services::{InferenceError, InferenceService};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    inputs: &'a [String],
}

/// Una salida por entrada; `null` = falla de ese ítem.
#[derive(Debug, Deserialize)]
struct InferResponse {
    outputs: Vec<Option<String>>,
}

/// Servidor de modelo HTTP: `POST {url}` con `{"inputs": [...]}`.
pub struct HttpInference {
    client: Client,
    url: String,
}

impl HttpInference {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

fn align_outputs(
    len: usize,
    outputs: Vec<Option<String>>,
) -> Vec<Result<String, InferenceError>> {
    let mut outputs = outputs.into_iter();
    (0..len)
        .map(|_| match outputs.next() {
            Some(Some(v)) => Ok(v),
            Some(None) => Err(InferenceError::Failed("el modelo no devolvió valor".into())),
            None => Err(InferenceError::Failed("respuesta más corta que el lote".into())),
        })
        .collect()
}

#[async_trait]
impl InferenceService for HttpInference {
    async fn infer(&self, inputs: &[String]) -> Vec<Result<String, InferenceError>> {
        let res = self
            .client
            .post(&self.url)
            .json(&InferRequest { inputs })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let res = match res {
            Ok(r) => r,
            Err(e) => {
                warn!("inferencia falló para el lote: {}", e);
                let err = if e.is_timeout() {
                    InferenceError::Timeout
                } else {
                    InferenceError::Failed(e.to_string())
                };
                return vec![Err(err); inputs.len()];
            }
        };

        match res.json::<InferResponse>().await {
            Ok(body) => align_outputs(inputs.len(), body.outputs),
            Err(e) => vec![Err(InferenceError::Failed(e.to_string())); inputs.len()],
        }
    }
}

/// Convierte rutas del store en paths del filesystem antes de pasarlas al
/// modelo (el caption lee la imagen del disco).
pub struct PathRooted<S> {
    inner: S,
    root: PathBuf,
}

impl<S> PathRooted<S> {
    pub fn new(inner: S, root: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }
}

#[async_trait]
impl<S: InferenceService> InferenceService for PathRooted<S> {
    async fn infer(&self, inputs: &[String]) -> Vec<Result<String, InferenceError>> {
        let paths: Vec<String> = inputs
            .iter()
            .map(|p| self.root.join(p).to_string_lossy().to_string())
            .collect();
        self.inner.infer(&paths).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn salidas_se_alinean_con_el_lote() {
        let out = align_outputs(3, vec![Some("POS".into()), None]);
        assert_eq!(out[0], Ok("POS".to_string()));
        assert!(out[1].is_err());
        assert!(out[2].is_err());
    }

    struct Spy(Mutex<Vec<String>>);

    #[async_trait]
    impl InferenceService for Spy {
        async fn infer(&self, inputs: &[String]) -> Vec<Result<String, InferenceError>> {
            self.0.lock().unwrap().extend(inputs.iter().cloned());
            inputs.iter().map(|_| Ok(String::new())).collect()
        }
    }

    #[tokio::test]
    async fn path_rooted_antepone_la_raiz() {
        let svc = PathRooted::new(Spy(Mutex::new(Vec::new())), "/data/image");
        svc.infer(&["d/images/a.jpg".to_string()]).await;
        assert_eq!(svc.inner.0.lock().unwrap()[0], "/data/image/d/images/a.jpg");
    }
}
