use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use kubemodel_api::{
    model::{ModelCrd, ModelPhase, ModelStatus},
    name,
};
use kubemodel_provider::{
    client::ModelClient, job::build_download_job, storage_claim::build_storage_claim,
};
use tracing::{debug, info, instrument, warn, Level};

use crate::{
    condition,
    phase::{
        transition, Observation, PendingOutcome, RequeueIntervals, TaskObservation, Transition,
    },
};

const RESOURCE_JOB: &str = "Job";
const RESOURCE_JOB_BUILD: &str = "download Job";
const RESOURCE_STORAGE_CLAIM: &str = "PVC";

pub struct ModelReconciler<'a, C> {
    pub client: &'a C,
    pub intervals: &'a RequeueIntervals,
}

impl<'a, C> ModelReconciler<'a, C>
where
    C: ModelClient,
{
    /// Runs one reconciliation pass over the model.
    ///
    /// Returns the delay until the next pass, or `None` if the model is gone.
    #[instrument(level = Level::INFO, skip(self), err(Display))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Option<Duration>> {
        let model = match self.client.load_model(namespace, name).await? {
            Some(model) => model,
            None => {
                debug!("model has been deleted: {namespace}/{name}");
                return Ok(None);
            }
        };

        let observation = self.observe(namespace, &model).await?;
        let transition = transition(observation, self.intervals);
        self.update_status(namespace, &model, &transition).await?;
        Ok(Some(transition.requeue))
    }

    async fn observe(&self, namespace: &str, model: &ModelCrd) -> Result<Observation> {
        let model_name = model.name_any();

        match model.phase() {
            ModelPhase::Pending => self
                .ensure_resources(namespace, model)
                .await
                .map(Observation::Pending),
            ModelPhase::Downloading => {
                let job_name = name::job_name(&model_name);
                self.client
                    .load_job(namespace, &job_name)
                    .await
                    .map(|job| {
                        Observation::Downloading(
                            job.map(|job| TaskObservation::from_status(job.status.as_ref())),
                        )
                    })
            }
            ModelPhase::Ready => {
                let claim_name = name::storage_claim_name(&model_name);
                self.client
                    .load_storage_claim(namespace, &claim_name)
                    .await
                    .map(|claim| Observation::Ready {
                        storage_claim_exists: claim.is_some(),
                    })
            }
            ModelPhase::Failed => {
                let job_name = name::job_name(&model_name);
                self.client
                    .load_job(namespace, &job_name)
                    .await
                    .map(|job| Observation::Failed {
                        task_exists: job.is_some(),
                    })
            }
        }
    }

    async fn ensure_resources(
        &self,
        namespace: &str,
        model: &ModelCrd,
    ) -> Result<PendingOutcome> {
        let model_name = model.name_any();

        // build both first; an invalid model must leave nothing behind
        let job = match build_download_job(model) {
            Ok(job) => job,
            Err(error) => {
                warn!("failed to build download job: {namespace}/{model_name}: {error}");
                return Ok(PendingOutcome::BuildFailed {
                    resource: RESOURCE_JOB_BUILD,
                    error: error.to_string(),
                });
            }
        };
        let claim = match build_storage_claim(model) {
            Ok(claim) => claim,
            Err(error) => {
                warn!("failed to build storage claim: {namespace}/{model_name}: {error}");
                return Ok(PendingOutcome::BuildFailed {
                    resource: RESOURCE_STORAGE_CLAIM,
                    error: error.to_string(),
                });
            }
        };

        let claim_name = claim.name_any();
        if self
            .client
            .load_storage_claim(namespace, &claim_name)
            .await?
            .is_none()
        {
            info!("creating storage claim: {namespace}/{claim_name}");
            if let Err(error) = self.client.create_storage_claim(namespace, &claim).await {
                warn!("failed to create storage claim: {namespace}/{claim_name}: {error}");
                return Ok(PendingOutcome::CreateFailed {
                    resource: RESOURCE_STORAGE_CLAIM,
                    error: error.to_string(),
                });
            }
        }

        let job_name = job.name_any();
        if self.client.load_job(namespace, &job_name).await?.is_none() {
            info!("creating download job: {namespace}/{job_name}");
            if let Err(error) = self.client.create_job(namespace, &job).await {
                warn!("failed to create download job: {namespace}/{job_name}: {error}");
                return Ok(PendingOutcome::CreateFailed {
                    resource: RESOURCE_JOB,
                    error: error.to_string(),
                });
            }
        }

        Ok(PendingOutcome::Scheduled)
    }

    async fn update_status(
        &self,
        namespace: &str,
        model: &ModelCrd,
        transition: &Transition,
    ) -> Result<()> {
        let model_name = model.name_any();
        let last = model.status.clone().unwrap_or_default();

        let message = transition.message.clone().or_else(|| last.message.clone());
        let observed_generation = model.metadata.generation;
        let mut conditions = last.conditions.clone();
        condition::set_ready(
            &mut conditions,
            transition.phase,
            message.as_deref().unwrap_or_default(),
            observed_generation,
            Time(Utc::now()),
        );

        let status = ModelStatus {
            phase: Some(transition.phase),
            message,
            progress: transition.progress,
            pvc_name: Some(name::storage_claim_name(&model_name)),
            conditions,
            observed_generation,
        };
        if status == last {
            return Ok(());
        }

        if last.phase != status.phase {
            info!(
                "model is {phase}: {namespace}/{model_name}",
                phase = transition.phase,
            );
        }
        self.client
            .update_model_status(namespace, &model_name, &status)
            .await
    }
}
