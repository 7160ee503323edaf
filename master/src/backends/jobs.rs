// master/src/backends/jobs.rs

use async_trait::async_trait;
use common::artifact::parse_uri;
use common::error::{Error, Result};
use common::job::{JobId, JobParams, JobState, RemoteJob};
use common::programs::run_program;
use common::services::BatchJobService;
use common::store::ArtifactStore;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

/// Servicio batch en proceso: `submit` devuelve el id enseguida y el
/// programa corre en segundo plano sobre el store.
#[derive(Clone)]
pub struct LocalBatchJobService {
    store: Arc<dyn ArtifactStore>,
    jobs: Arc<Mutex<HashMap<JobId, RemoteJob>>>,
}

impl LocalBatchJobService {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, RemoteJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, job_id: &str, state: JobState) {
        if let Some(job) = self.jobs().get_mut(job_id) {
            job.state = state;
        }
    }
}

#[async_trait]
impl BatchJobService for LocalBatchJobService {
    async fn submit(&self, cluster: &str, program_uri: &str, args: &[String]) -> Result<JobId> {
        let Some((bucket, key)) = parse_uri(program_uri) else {
            return Err(Error::JobFileMissing {
                uri: program_uri.to_string(),
            });
        };
        if !self.store.exists(bucket, key).await? {
            return Err(Error::JobFileMissing {
                uri: program_uri.to_string(),
            });
        }
        let params = JobParams::from_args(args)?;

        let job_id = uuid::Uuid::new_v4().to_string();
        self.jobs().insert(
            job_id.clone(),
            RemoteJob {
                id: job_id.clone(),
                cluster: cluster.to_string(),
                program_uri: program_uri.to_string(),
                args: args.to_vec(),
                state: JobState::Submitted,
            },
        );
        info!("job {} aceptado en cluster {} ({})", job_id, cluster, program_uri);

        let svc = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            svc.set_state(&id, JobState::Running);
            match run_program(svc.store.as_ref(), &params).await {
                Ok(rows) => {
                    info!("job {} terminó ({} filas)", id, rows);
                    svc.set_state(&id, JobState::Succeeded);
                }
                Err(e) => {
                    warn!("job {} falló: {}", id, e);
                    svc.set_state(&id, JobState::Failed);
                }
            }
        });

        Ok(job_id)
    }

    /// Un estado terminal se informa una sola vez: después el job sale de
    /// la tabla.
    async fn status(&self, job_id: &str) -> Result<JobState> {
        let mut jobs = self.jobs();
        let state = jobs
            .get(job_id)
            .map(|j| j.state)
            .ok_or_else(|| Error::UnknownJob {
                job_id: job_id.to_string(),
            })?;
        if state.is_terminal() {
            jobs.remove(job_id);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryArtifactStore;
    use std::time::Duration;

    fn merge_args() -> Vec<String> {
        JobParams::MergeDirectory {
            bucket: "text".into(),
            directory: "2024-01-10-2024-01-17".into(),
            image_bucket: "image".into(),
        }
        .to_args()
    }

    async fn wait_terminal(svc: &LocalBatchJobService, id: &str) -> JobState {
        for _ in 0..200 {
            let st = svc.status(id).await.unwrap();
            if st.is_terminal() {
                return st;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("el job {id} no terminó");
    }

    #[tokio::test]
    async fn submit_corre_el_merge_en_segundo_plano() {
        let store = Arc::new(MemoryArtifactStore::new());
        store
            .put("jobs", "programs/merge_files.json", b"{}".to_vec())
            .await
            .unwrap();
        store
            .put(
                "text",
                "2024-01-10-2024-01-17/ucla-text-1.jsonl",
                b"{\"id\":\"a\",\"text\":\"hola\"}\n".to_vec(),
            )
            .await
            .unwrap();

        let svc = LocalBatchJobService::new(store.clone());
        let id = svc
            .submit("cluster-a", "store://jobs/programs/merge_files.json", &merge_args())
            .await
            .unwrap();

        assert_eq!(wait_terminal(&svc, &id).await, JobState::Succeeded);
        assert!(svc.jobs().is_empty());
        assert_eq!(svc.status(&id).await.unwrap_err().kind(), "UnknownJob");
        assert!(store
            .exists("text", "2024-01-10-2024-01-17/combined/_SUCCESS")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn programa_no_publicado_es_job_file_missing() {
        let svc = LocalBatchJobService::new(Arc::new(MemoryArtifactStore::new()));
        let err = svc
            .submit("cluster-a", "store://jobs/programs/merge_files.json", &merge_args())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "JobFileMissing");
    }

    #[tokio::test]
    async fn job_desconocido() {
        let svc = LocalBatchJobService::new(Arc::new(MemoryArtifactStore::new()));
        assert_eq!(svc.status("nope").await.unwrap_err().kind(), "UnknownJob");
    }
}
