mod kubernetes;
#[cfg(feature = "memory")]
mod memory;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::{batch::v1::Job, core::v1::PersistentVolumeClaim};
use kubemodel_api::model::{ModelCrd, ModelStatus};

pub use self::kubernetes::KubernetesModelClient;
#[cfg(feature = "memory")]
pub use self::memory::MemoryModelClient;

/// Cluster state the model operator and the injector depend on.
///
/// `load_*` return `None` for an absent object; every other failure is an error.
/// `create_*` treat an object which already exists as a success.
#[async_trait]
pub trait ModelClient
where
    Self: Send + Sync,
{
    async fn load_model(&self, namespace: &str, name: &str) -> Result<Option<ModelCrd>>;

    async fn load_storage_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>>;

    async fn load_job(&self, namespace: &str, name: &str) -> Result<Option<Job>>;

    async fn create_storage_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<()>;

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<()>;

    async fn update_model_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ModelStatus,
    ) -> Result<()>;
}
