use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::{
    api::{batch::v1::Job, core::v1::PersistentVolumeClaim},
    NamespaceResourceScope,
};
use kube::{
    api::{Patch, PatchParams, PostParams},
    Api, Client, CustomResourceExt, Error, Resource, ResourceExt,
};
use kubemodel_api::model::{ModelCrd, ModelStatus};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, instrument, Level};

use super::ModelClient;

#[derive(Copy, Clone)]
pub struct KubernetesModelClient<'kube> {
    pub kube: &'kube Client,
    pub field_manager: &'static str,
}

impl<'kube> KubernetesModelClient<'kube> {
    fn api_namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.kube.clone(), namespace)
    }

    async fn load<K>(&self, namespace: &str, name: &str) -> Result<Option<K>>
    where
        K: Clone + ::core::fmt::Debug + DeserializeOwned + Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        self.api_namespaced::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(Into::into)
    }

    async fn create<K>(&self, namespace: &str, data: &K) -> Result<()>
    where
        K: Clone
            + ::core::fmt::Debug
            + DeserializeOwned
            + Serialize
            + Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let api = self.api_namespaced::<K>(namespace);
        let pp = PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.into()),
        };

        match api.create(&pp, data).await {
            Ok(_) => Ok(()),
            // NOTE: the existing object is not compared with the desired one
            Err(Error::Api(error)) if error.reason == "AlreadyExists" => {
                let dt = Default::default();
                let kind = <K as Resource>::kind(&dt);
                let name = data.name_any();
                debug!("{kind} already exists: {namespace}/{name}");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl<'kube> ModelClient for KubernetesModelClient<'kube> {
    #[instrument(level = Level::INFO, skip(self), err(Display))]
    async fn load_model(&self, namespace: &str, name: &str) -> Result<Option<ModelCrd>> {
        self.load(namespace, name).await
    }

    #[instrument(level = Level::INFO, skip(self), err(Display))]
    async fn load_storage_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        self.load(namespace, name).await
    }

    #[instrument(level = Level::INFO, skip(self), err(Display))]
    async fn load_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        self.load(namespace, name).await
    }

    #[instrument(level = Level::INFO, skip(self, claim), fields(name = %claim.name_any()), err(Display))]
    async fn create_storage_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<()> {
        self.create(namespace, claim).await
    }

    #[instrument(level = Level::INFO, skip(self, job), fields(name = %job.name_any()), err(Display))]
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<()> {
        self.create(namespace, job).await
    }

    #[instrument(level = Level::INFO, skip(self, status), err(Display))]
    async fn update_model_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ModelStatus,
    ) -> Result<()> {
        let api = self.api_namespaced::<ModelCrd>(namespace);
        let crd = ModelCrd::api_resource();

        let patch = Patch::Merge(json!({
            "apiVersion": crd.api_version,
            "kind": crd.kind,
            "status": status,
        }));
        let pp = PatchParams::apply(self.field_manager);
        api.patch_status(name, &pp, &patch).await?;
        Ok(())
    }
}
