mod condition;
mod ctx;
mod phase;
mod reconciler;

use ark_core_k8s::manager::Ctx;

pub(crate) mod consts {
    pub const NAME: &str = "kubemodel-operator";

    pub const ENV_REQUEUE_PENDING: &str = "MODEL_REQUEUE_PENDING_SECS";
    pub const ENV_REQUEUE_DOWNLOADING: &str = "MODEL_REQUEUE_DOWNLOADING_SECS";
    pub const ENV_REQUEUE_READY: &str = "MODEL_REQUEUE_READY_SECS";
    pub const ENV_REQUEUE_FAILED: &str = "MODEL_REQUEUE_FAILED_SECS";
}

#[tokio::main]
async fn main() {
    self::ctx::model::Ctx::spawn_crd().await
}
