pub mod client;
pub mod job;
pub mod modelfile;
pub mod owner;
pub mod storage_claim;

mod script;

use kubemodel_api::model::SourceError;
use thiserror::Error;

/// Failure to turn a model into its subordinate resources.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to render the download script: {0}")]
    Script(#[from] ::tera::Error),
    #[error("model has no uid yet: {0}")]
    Owner(String),
}

pub(crate) mod consts {
    use std::collections::BTreeMap;

    use kubemodel_api::consts::{LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME, MANAGED_BY};
    use maplit::btreemap;

    /// Where the storage claim is mounted inside the download job.
    pub const MOUNT_PATH: &str = "/models";

    pub fn labels(app: &str, model_name: &str) -> BTreeMap<String, String> {
        btreemap! {
            LABEL_NAME.into() => app.into(),
            LABEL_INSTANCE.into() => model_name.into(),
            LABEL_MANAGED_BY.into() => MANAGED_BY.into(),
        }
    }
}
