use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use kubemodel_api::model::ModelCrd;

use crate::BuildError;

/// Links a subordinate resource to its model, so that deleting the model
/// lets the garbage collector cascade to it.
pub fn owner_reference(model: &ModelCrd) -> Result<OwnerReference, BuildError> {
    model
        .controller_owner_ref(&())
        .ok_or_else(|| BuildError::Owner(model.name_any()))
}
