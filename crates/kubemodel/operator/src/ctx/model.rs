use std::sync::Arc;

use anyhow::{anyhow, Result};
use ark_core_k8s::manager::{Manager, TryDefault};
use async_trait::async_trait;
use k8s_openapi::api::{batch::v1::Job, core::v1::PersistentVolumeClaim};
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, Error, ResourceExt,
};
use kubemodel_api::model::ModelCrd;
use kubemodel_provider::client::KubernetesModelClient;
use tracing::{instrument, Level};

use crate::{phase::RequeueIntervals, reconciler::ModelReconciler};

pub struct Ctx {
    intervals: RequeueIntervals,
}

#[async_trait]
impl TryDefault for Ctx {
    async fn try_default() -> Result<Self> {
        Ok(Self {
            intervals: RequeueIntervals::try_from_env()?,
        })
    }
}

#[async_trait]
impl ::ark_core_k8s::manager::Ctx for Ctx {
    type Data = ModelCrd;

    const NAME: &'static str = crate::consts::NAME;

    fn watch_owned(controller: Controller<ModelCrd>, client: &Client) -> Controller<ModelCrd> {
        controller
            .owns(Api::<Job>::all(client.clone()), Config::default())
            .owns(
                Api::<PersistentVolumeClaim>::all(client.clone()),
                Config::default(),
            )
    }

    #[instrument(level = Level::INFO, skip_all, fields(name = %data.name_any(), namespace = data.namespace()), err(Display))]
    async fn reconcile(
        manager: Arc<Manager<Self>>,
        data: Arc<<Self as ::ark_core_k8s::manager::Ctx>::Data>,
    ) -> Result<Action, Error>
    where
        Self: Sized,
    {
        let name = data.name_any();
        let namespace = data
            .namespace()
            .ok_or_else(|| Error::Service(anyhow!("model has no namespace: {name}").into()))?;

        let client = KubernetesModelClient {
            kube: &manager.kube,
            field_manager: <Self as ::ark_core_k8s::manager::Ctx>::NAME,
        };
        let reconciler = ModelReconciler {
            client: &client,
            intervals: &manager.ctx.intervals,
        };

        match reconciler.reconcile(&namespace, &name).await {
            Ok(Some(requeue)) => Ok(Action::requeue(requeue)),
            Ok(None) => Ok(Action::await_change()),
            Err(e) => Err(Error::Service(e.into())),
        }
    }
}
