use k8s_openapi::{
    api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements},
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{api::ObjectMeta, ResourceExt};
use kubemodel_api::{model::ModelCrd, name};
use maplit::btreemap;

use crate::{consts, owner::owner_reference, BuildError};

pub fn build_storage_claim(model: &ModelCrd) -> Result<PersistentVolumeClaim, BuildError> {
    let model_name = model.name_any();
    let storage = &model.spec.storage;

    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name::storage_claim_name(&model_name)),
            namespace: model.namespace(),
            labels: Some(consts::labels("model", &model_name)),
            owner_references: Some(vec![owner_reference(model)?]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(if storage.access_modes.is_empty() {
                vec!["ReadWriteOnce".into()]
            } else {
                storage.access_modes.clone()
            }),
            storage_class_name: Some(storage.storage_class.clone()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(btreemap! {
                    "storage".into() => Quantity(storage.size.clone()),
                }),
                limits: None,
            }),
            ..Default::default()
        }),
        status: None,
    })
}
