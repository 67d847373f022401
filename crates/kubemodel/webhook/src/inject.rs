use k8s_openapi::api::core::v1::{
    EnvVar, PersistentVolumeClaimVolumeSource, Pod, Volume, VolumeMount,
};
use kube::ResourceExt;
use kubemodel_api::{
    model::{ModelCrd, ModelSourceKind},
    name,
};
use thiserror::Error;

use crate::options::InjectionOptions;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("pod has no containers")]
    NoContainers,
    #[error("container {0:?} not found")]
    ContainerNotFound(String),
}

/// Wires a ready model into the pod.
///
/// Every insertion is skipped if an entry with the same name already exists,
/// so injecting the same model twice changes nothing.
pub fn inject_model(
    pod: &mut Pod,
    model: &ModelCrd,
    options: &InjectionOptions,
) -> Result<(), InjectionError> {
    let model_name = model.name_any();
    let volume_name = name::volume_name(&model_name);
    let mount_path = options.mount_path(&model_name);

    let spec = pod.spec.get_or_insert_with(Default::default);
    if spec.containers.is_empty() {
        return Err(InjectionError::NoContainers);
    }
    let index = match options.container.as_deref() {
        Some(container_name) => spec
            .containers
            .iter()
            .position(|container| container.name == container_name)
            .ok_or_else(|| InjectionError::ContainerNotFound(container_name.into()))?,
        None => 0,
    };

    let volumes = spec.volumes.get_or_insert_with(Default::default);
    if !volumes.iter().any(|volume| volume.name == volume_name) {
        volumes.push(Volume {
            name: volume_name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: name::storage_claim_name(&model_name),
                read_only: Some(true),
            }),
            ..Default::default()
        });
    }

    let container = &mut spec.containers[index];
    let volume_mounts = container.volume_mounts.get_or_insert_with(Default::default);
    if !volume_mounts.iter().any(|mount| mount.name == volume_name) {
        volume_mounts.push(VolumeMount {
            name: volume_name,
            mount_path: mount_path.clone(),
            read_only: Some(options.read_only),
            ..Default::default()
        });
    }

    if options.inject_env {
        let env = container.env.get_or_insert_with(Default::default);
        for (key, value) in model_env(model, &model_name, mount_path) {
            if !env.iter().any(|var| var.name == key) {
                env.push(EnvVar {
                    name: key,
                    value: Some(value),
                    ..Default::default()
                });
            }
        }
    }
    Ok(())
}

fn model_env(model: &ModelCrd, model_name: &str, mount_path: String) -> Vec<(String, String)> {
    let prefix = name::env_prefix(model_name);

    let source = model.spec.source.resolve().ok().map(|source| {
        let (key, value) = match source {
            ModelSourceKind::HuggingFace(source) => ("REPO_ID", &source.repo_id),
            ModelSourceKind::Url(source) => ("URL", &source.url),
            ModelSourceKind::S3(source) => ("BUCKET", &source.bucket),
            ModelSourceKind::Git(source) => ("GIT_URL", &source.url),
        };
        [
            ("SOURCE_TYPE", source.type_name().to_string()),
            (key, value.clone()),
        ]
    });

    [
        Some(("NAME", model_name.to_string())),
        Some(("MOUNT_PATH", mount_path)),
        model.spec.version.clone().map(|version| ("VERSION", version)),
    ]
    .into_iter()
    .flatten()
    .chain(source.into_iter().flatten())
    .map(|(key, value)| (format!("{prefix}_{key}"), value))
    .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use kubemodel_api::model::{
        GitSource, HuggingFaceSource, ModelSource, ModelSpec, ModelStorageSpec, S3Source,
    };

    use super::*;

    fn model(name: &str, source: impl Into<ModelSource>, version: Option<&str>) -> ModelCrd {
        ModelCrd::new(
            name,
            ModelSpec {
                source: source.into(),
                storage: ModelStorageSpec::new("standard", "10Gi"),
                modelfile: None,
                version: version.map(Into::into),
                credentials_secret: None,
                node_selector: BTreeMap::default(),
            },
        )
    }

    fn pod(containers: &[&str]) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|&name| Container {
                        name: name.into(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn options() -> InjectionOptions {
        InjectionOptions {
            models: vec!["m1".into()],
            mount_path: None,
            read_only: true,
            container: None,
            inject_env: true,
        }
    }

    fn env(pod: &Pod, index: usize) -> Vec<(&str, &str)> {
        pod.spec.as_ref().unwrap().containers[index]
            .env
            .iter()
            .flatten()
            .map(|var| (var.name.as_str(), var.value.as_deref().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn inject_into_first_container() {
        let mut pod = pod(&["app", "sidecar"]);
        let model = model("m1", HuggingFaceSource::new("org/m1"), Some("v1"));
        inject_model(&mut pod, &model, &options()).unwrap();

        let spec = pod.spec.as_ref().unwrap();
        let volumes = spec.volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "model-m1");
        let claim = volumes[0].persistent_volume_claim.as_ref().unwrap();
        assert_eq!(claim.claim_name, "model-m1");
        assert_eq!(claim.read_only, Some(true));

        let mounts = spec.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/models/m1");
        assert_eq!(mounts[0].read_only, Some(true));
        assert!(spec.containers[1].volume_mounts.is_none());

        assert_eq!(
            env(&pod, 0),
            [
                ("MODEL_M1_NAME", "m1"),
                ("MODEL_M1_MOUNT_PATH", "/models/m1"),
                ("MODEL_M1_VERSION", "v1"),
                ("MODEL_M1_SOURCE_TYPE", "huggingface"),
                ("MODEL_M1_REPO_ID", "org/m1"),
            ],
        );
    }

    #[test]
    fn inject_into_named_container() {
        let mut pod = pod(&["app", "server"]);
        let model = model(
            "llama-3-8b",
            S3Source {
                bucket: "artifacts".into(),
                key: "llama".into(),
                endpoint: None,
                region: None,
            },
            None,
        );
        let options = InjectionOptions {
            mount_path: Some("/data".into()),
            read_only: false,
            container: Some("server".into()),
            ..options()
        };
        inject_model(&mut pod, &model, &options).unwrap();

        let spec = pod.spec.as_ref().unwrap();
        assert!(spec.containers[0].volume_mounts.is_none());
        let mount = &spec.containers[1].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/data/llama-3-8b");
        assert_eq!(mount.read_only, Some(false));
        assert_eq!(
            env(&pod, 1),
            [
                ("MODEL_LLAMA_3_8B_NAME", "llama-3-8b"),
                ("MODEL_LLAMA_3_8B_MOUNT_PATH", "/data/llama-3-8b"),
                ("MODEL_LLAMA_3_8B_SOURCE_TYPE", "s3"),
                ("MODEL_LLAMA_3_8B_BUCKET", "artifacts"),
            ],
        );
    }

    #[test]
    fn inject_git_source_env() {
        let mut pod = pod(&["app"]);
        let model = model("m1", GitSource::new("https://example.com/m1.git"), None);
        inject_model(&mut pod, &model, &options()).unwrap();

        let env = env(&pod, 0);
        assert!(env.contains(&("MODEL_M1_SOURCE_TYPE", "git")));
        assert!(env.contains(&("MODEL_M1_GIT_URL", "https://example.com/m1.git")));
    }

    #[test]
    fn inject_twice_is_noop() {
        let mut pod = pod(&["app"]);
        let model = model("m1", HuggingFaceSource::new("org/m1"), None);
        inject_model(&mut pod, &model, &options()).unwrap();
        let once = pod.clone();
        inject_model(&mut pod, &model, &options()).unwrap();
        assert_eq!(pod, once);
    }

    #[test]
    fn keep_existing_env() {
        let mut pod = pod(&["app"]);
        pod.spec.as_mut().unwrap().containers[0].env = Some(vec![EnvVar {
            name: "MODEL_M1_MOUNT_PATH".into(),
            value: Some("/custom".into()),
            ..Default::default()
        }]);
        let model = model("m1", HuggingFaceSource::new("org/m1"), None);
        inject_model(&mut pod, &model, &options()).unwrap();

        let env = env(&pod, 0);
        assert_eq!(env[0], ("MODEL_M1_MOUNT_PATH", "/custom"));
        assert_eq!(
            env.iter()
                .filter(|(key, _)| *key == "MODEL_M1_MOUNT_PATH")
                .count(),
            1,
        );
    }

    #[test]
    fn skip_env_when_disabled() {
        let mut pod = pod(&["app"]);
        let model = model("m1", HuggingFaceSource::new("org/m1"), None);
        let options = InjectionOptions {
            inject_env: false,
            ..options()
        };
        inject_model(&mut pod, &model, &options).unwrap();

        assert!(env(&pod, 0).is_empty());
        assert!(pod.spec.unwrap().containers[0].volume_mounts.is_some());
    }

    #[test]
    fn reject_unresolvable_container() {
        let model = model("m1", HuggingFaceSource::new("org/m1"), None);

        assert_eq!(
            inject_model(&mut pod(&[]), &model, &options()),
            Err(InjectionError::NoContainers),
        );

        let options = InjectionOptions {
            container: Some("missing".into()),
            ..options()
        };
        assert_eq!(
            inject_model(&mut pod(&["app"]), &model, &options),
            Err(InjectionError::ContainerNotFound("missing".into())),
        );
    }
}
