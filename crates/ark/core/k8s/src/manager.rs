use core::{future::Future, time::Duration};
use std::sync::Arc;

use anyhow::Result;
use ark_core::tracer;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Patch, PatchParams, PostParams},
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, CustomResourceExt, Error, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

pub struct Manager<C> {
    pub kube: Client,
    pub ctx: Arc<C>,
}

#[async_trait]
pub trait Ctx
where
    Self: 'static + Send + Sync + TryDefault,
    <Self as Ctx>::Data:
        Send + Sync + Clone + ::core::fmt::Debug + DeserializeOwned + Resource<DynamicType = ()>,
    <<Self as Ctx>::Data as Resource>::DynamicType:
        Clone + ::core::fmt::Debug + Default + Eq + Unpin + ::core::hash::Hash,
{
    type Data;

    const NAME: &'static str;
    const FALLBACK: Duration = Duration::from_secs(30); // 30 seconds

    /// Registers the child resources whose changes should wake up their owner.
    fn watch_owned(
        controller: Controller<<Self as Ctx>::Data>,
        _client: &Client,
    ) -> Controller<<Self as Ctx>::Data> {
        controller
    }

    async fn spawn_crd()
    where
        Self: Sized,
        <Self as Ctx>::Data: CustomResourceExt,
    {
        <Self as Ctx>::try_spawn(|client| async move {
            Self::init_crd(client.clone())
                .await
                .map(|()| Self::init_resource(client))
        })
        .await
        .expect("spawning a manager with CRD")
    }

    async fn try_spawn<F, Fut>(f_init: F) -> Result<()>
    where
        Self: Sized,
        F: FnOnce(Client) -> Fut + Send,
        Fut: Future<Output = Result<Api<<Self as Ctx>::Data>>> + Send,
    {
        tracer::init_once_as(<Self as Ctx>::NAME);

        let client = Client::try_default().await?;
        let ctx = Arc::new(Self::try_default().await?);
        let manager = Arc::new(Manager {
            kube: client.clone(),
            ctx: ctx.clone(),
        });

        let api = f_init(client.clone()).await?;

        // All good. Start controller and return its future.
        let controller = Controller::new(api, Config::default());
        <Self as Ctx>::watch_owned(controller, &client)
            .shutdown_on_signal()
            .run(
                |data, manager| Self::reconcile(manager, data),
                |data, error, manager| {
                    let kind = <<Self as Ctx>::Data>::kind(&());
                    let name = data.name_any();
                    warn!("failed to reconcile {kind} {name:?}: {error}");
                    Self::error_policy(manager, error)
                },
                manager,
            )
            .for_each(|_| ::futures::future::ready(()))
            .await;
        Ok(())
    }

    fn init_resource(client: Client) -> Api<<Self as Ctx>::Data> {
        Api::<<Self as Ctx>::Data>::all(client)
    }

    async fn init_crd(client: Client) -> Result<()>
    where
        <Self as Ctx>::Data: CustomResourceExt,
    {
        // Ensure CRD is installed before loop-watching
        let api = Api::<CustomResourceDefinition>::all(client);
        let crd = <Self as Ctx>::Data::crd();
        let name = crd.name_any();

        if api.get_opt(&name).await?.is_none() {
            let pp = PostParams {
                dry_run: false,
                field_manager: Some(<Self as Ctx>::NAME.into()),
            };
            api.create(&pp, &crd).await?;

            info!("Created CRD: {name}");
            Ok(())
        } else {
            let pp = PatchParams {
                dry_run: false,
                force: true,
                field_manager: Some(<Self as Ctx>::NAME.into()),
                ..Default::default()
            };
            api.patch(&name, &pp, &Patch::Apply(&crd)).await?;

            info!("Updated CRD: {name}");
            Ok(())
        }
    }

    async fn reconcile(
        manager: Arc<Manager<Self>>,
        data: Arc<<Self as Ctx>::Data>,
    ) -> Result<Action, Error>
    where
        Self: Sized;

    fn error_policy<E>(_manager: Arc<Manager<Self>>, _error: &E) -> Action
    where
        Self: Sized,
        E: ::std::fmt::Debug,
    {
        Action::requeue(<Self as Ctx>::FALLBACK)
    }
}

#[async_trait]
pub trait TryDefault {
    async fn try_default() -> Result<Self>
    where
        Self: Sized;
}

#[async_trait]
impl<T> TryDefault for T
where
    T: Default,
{
    async fn try_default() -> Result<Self> {
        Ok(T::default())
    }
}
