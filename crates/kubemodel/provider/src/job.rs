use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        batch::v1::{Job, JobSpec},
        core::v1::{
            Container, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource, PodSpec,
            PodTemplateSpec, ResourceRequirements, SecretKeySelector, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{api::ObjectMeta, ResourceExt};
use kubemodel_api::{
    model::{ModelCrd, ModelSourceKind},
    name,
};
use maplit::btreemap;

use crate::{consts, modelfile::build_modelfile, owner::owner_reference, script, BuildError};

const BACKOFF_LIMIT: i32 = 3;
const TTL_SECONDS_AFTER_FINISHED: i32 = 3600; // 1 hour

const CONTAINER_NAME: &str = "downloader";
const VOLUME_NAME: &str = "model-storage";

/// Container settings of the downloader for each kind of source.
struct DownloaderProfile {
    image: &'static str,
    requests: Resources,
    limits: Resources,
    /// Optional keys read from the credentials secret.
    secret_keys: &'static [&'static str],
}

struct Resources {
    memory: &'static str,
    cpu: &'static str,
}

impl Resources {
    fn to_quantities(&self) -> BTreeMap<String, Quantity> {
        btreemap! {
            "cpu".into() => Quantity(self.cpu.into()),
            "memory".into() => Quantity(self.memory.into()),
        }
    }
}

impl DownloaderProfile {
    const HUGGING_FACE: Self = Self {
        image: "python:3.11-slim",
        requests: Resources {
            memory: "512Mi",
            cpu: "500m",
        },
        limits: Resources {
            memory: "2Gi",
            cpu: "2",
        },
        secret_keys: &["HF_TOKEN"],
    };

    const URL: Self = Self {
        image: "curlimages/curl:latest",
        requests: Resources {
            memory: "128Mi",
            cpu: "100m",
        },
        limits: Resources {
            memory: "512Mi",
            cpu: "500m",
        },
        secret_keys: &[],
    };

    const S3: Self = Self {
        image: "amazon/aws-cli:latest",
        requests: Resources {
            memory: "256Mi",
            cpu: "250m",
        },
        limits: Resources {
            memory: "1Gi",
            cpu: "1",
        },
        secret_keys: &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
    };

    const GIT: Self = Self {
        image: "alpine/git:latest",
        requests: Resources {
            memory: "256Mi",
            cpu: "250m",
        },
        limits: Resources {
            memory: "2Gi",
            cpu: "2",
        },
        secret_keys: &["GIT_USERNAME", "GIT_PASSWORD"],
    };

    fn of(source: &ModelSourceKind<'_>) -> &'static Self {
        match source {
            ModelSourceKind::HuggingFace(_) => &Self::HUGGING_FACE,
            ModelSourceKind::Url(_) => &Self::URL,
            ModelSourceKind::S3(_) => &Self::S3,
            ModelSourceKind::Git(_) => &Self::GIT,
        }
    }

    fn env(&self, secret_name: Option<&str>) -> Option<Vec<EnvVar>> {
        let secret_name = secret_name.filter(|name| !name.is_empty())?;
        if self.secret_keys.is_empty() {
            return None;
        }

        Some(
            self.secret_keys
                .iter()
                .map(|&key| EnvVar {
                    name: key.into(),
                    value_from: Some(EnvVarSource {
                        secret_key_ref: Some(SecretKeySelector {
                            name: Some(secret_name.into()),
                            key: key.into(),
                            optional: Some(true),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        )
    }
}

/// Builds the one-shot job which fills the model's storage claim.
///
/// Nothing is touched on the cluster, so a model with an invalid source
/// fails here before any resource is created.
pub fn build_download_job(model: &ModelCrd) -> Result<Job, BuildError> {
    let source = model.spec.source.resolve()?;
    let owner = owner_reference(model)?;

    let model_name = model.name_any();
    let profile = DownloaderProfile::of(&source);
    let modelfile = build_modelfile(&source, model.spec.modelfile.as_ref());
    let script = script::render(&source, &modelfile)?;
    let labels = consts::labels("model-downloader", &model_name);

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(name::job_name(&model_name)),
            namespace: model.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(BACKOFF_LIMIT),
            ttl_seconds_after_finished: Some(TTL_SECONDS_AFTER_FINISHED),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("OnFailure".into()),
                    node_selector: if model.spec.node_selector.is_empty() {
                        None
                    } else {
                        Some(model.spec.node_selector.clone())
                    },
                    containers: vec![Container {
                        name: CONTAINER_NAME.into(),
                        image: Some(profile.image.into()),
                        command: Some(vec!["sh".into(), "-c".into()]),
                        args: Some(vec![script]),
                        env: profile.env(model.spec.credentials_secret.as_deref()),
                        resources: Some(ResourceRequirements {
                            requests: Some(profile.requests.to_quantities()),
                            limits: Some(profile.limits.to_quantities()),
                            ..Default::default()
                        }),
                        volume_mounts: Some(vec![VolumeMount {
                            name: VOLUME_NAME.into(),
                            mount_path: consts::MOUNT_PATH.into(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: VOLUME_NAME.into(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: name::storage_claim_name(&model_name),
                            read_only: None,
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}
