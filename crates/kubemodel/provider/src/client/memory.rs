use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use k8s_openapi::api::{
    batch::v1::{Job, JobStatus},
    core::v1::PersistentVolumeClaim,
};
use kube::ResourceExt;
use kubemodel_api::model::{ModelCrd, ModelStatus};
use tokio::sync::Mutex;

use super::ModelClient;

type Key = (String, String);

#[derive(Default)]
struct State {
    models: BTreeMap<Key, ModelCrd>,
    storage_claims: BTreeMap<Key, PersistentVolumeClaim>,
    jobs: BTreeMap<Key, Job>,
    rejection: Option<String>,
    job_rejection: Option<String>,
    status_updates: usize,
}

/// An in-memory cluster, standing in for the API server.
///
/// Models inserted here get a uid and a generation, like freshly created objects.
#[derive(Clone, Default)]
pub struct MemoryModelClient {
    state: Arc<Mutex<State>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.into(), name.into())
}

impl MemoryModelClient {
    pub async fn insert_model(&self, mut model: ModelCrd) {
        let name = model.name_any();
        let namespace = model.namespace().unwrap_or_else(|| "default".into());
        model.metadata.namespace = Some(namespace.clone());
        model
            .metadata
            .uid
            .get_or_insert_with(|| format!("uid-{namespace}-{name}"));
        model.metadata.generation.get_or_insert(1);

        self.state
            .lock()
            .await
            .models
            .insert(key(&namespace, &name), model);
    }

    pub async fn model(&self, namespace: &str, name: &str) -> Option<ModelCrd> {
        self.state
            .lock()
            .await
            .models
            .get(&key(namespace, name))
            .cloned()
    }

    pub async fn storage_claim(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.state
            .lock()
            .await
            .storage_claims
            .get(&key(namespace, name))
            .cloned()
    }

    pub async fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.state
            .lock()
            .await
            .jobs
            .get(&key(namespace, name))
            .cloned()
    }

    pub async fn remove_storage_claim(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .await
            .storage_claims
            .remove(&key(namespace, name));
    }

    pub async fn remove_job(&self, namespace: &str, name: &str) {
        self.state.lock().await.jobs.remove(&key(namespace, name));
    }

    /// Overrides the status of an existing job, as the job controller would.
    pub async fn set_job_status(&self, namespace: &str, name: &str, status: JobStatus) {
        if let Some(job) = self.state.lock().await.jobs.get_mut(&key(namespace, name)) {
            job.status = Some(status);
        }
    }

    /// Makes every following `create_*` call fail with the given message.
    pub async fn reject_creations(&self, message: impl Into<String>) {
        self.state.lock().await.rejection = Some(message.into());
    }

    /// Makes every following `create_job` call fail with the given message.
    pub async fn reject_job_creations(&self, message: impl Into<String>) {
        self.state.lock().await.job_rejection = Some(message.into());
    }

    /// Counts the status writes accepted so far.
    pub async fn status_updates(&self) -> usize {
        self.state.lock().await.status_updates
    }
}

#[async_trait]
impl ModelClient for MemoryModelClient {
    async fn load_model(&self, namespace: &str, name: &str) -> Result<Option<ModelCrd>> {
        Ok(self.model(namespace, name).await)
    }

    async fn load_storage_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self.storage_claim(namespace, name).await)
    }

    async fn load_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        Ok(self.job(namespace, name).await)
    }

    async fn create_storage_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.rejection {
            return Err(anyhow!("{message}"));
        }

        state
            .storage_claims
            .entry(key(namespace, &claim.name_any()))
            .or_insert_with(|| claim.clone());
        Ok(())
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.rejection.as_ref().or(state.job_rejection.as_ref()) {
            return Err(anyhow!("{message}"));
        }

        state
            .jobs
            .entry(key(namespace, &job.name_any()))
            .or_insert_with(|| job.clone());
        Ok(())
    }

    async fn update_model_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ModelStatus,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let model = state
            .models
            .get_mut(&key(namespace, name))
            .ok_or_else(|| anyhow!("no such model: {namespace}/{name}"))?;
        model.status = Some(status.clone());
        state.status_updates += 1;
        Ok(())
    }
}
