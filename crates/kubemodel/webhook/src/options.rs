use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use kubemodel_api::{
    consts::{
        ANNOTATION_CONTAINER, ANNOTATION_INJECT, ANNOTATION_INJECT_ENV, ANNOTATION_MOUNT_PATH,
        ANNOTATION_READ_ONLY, LABEL_INJECTED,
    },
    name,
};

const PLACEHOLDER_NAME: &str = "{name}";

/// Injection request of a workload, read from its annotations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionOptions {
    pub models: Vec<String>,
    pub mount_path: Option<String>,
    pub read_only: bool,
    /// Defaults to the first container.
    pub container: Option<String>,
    pub inject_env: bool,
}

impl InjectionOptions {
    /// Returns `None` if no injection is requested or the workload has already been injected.
    pub fn from_metadata(metadata: &ObjectMeta) -> Option<Self> {
        let injected = metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(LABEL_INJECTED))
            .is_some_and(|value| value == "true");
        if injected {
            return None;
        }

        metadata.annotations.as_ref().and_then(Self::parse)
    }

    fn parse(annotations: &BTreeMap<String, String>) -> Option<Self> {
        let models: Vec<_> = annotations
            .get(ANNOTATION_INJECT)?
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Into::into)
            .collect();
        if models.is_empty() {
            return None;
        }

        let get = |key: &str| {
            annotations
                .get(key)
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        };
        // only the literal "false" disables a toggle
        let toggle = |key: &str| get(key) != Some("false");

        Some(Self {
            models,
            mount_path: get(ANNOTATION_MOUNT_PATH).map(Into::into),
            read_only: toggle(ANNOTATION_READ_ONLY),
            container: get(ANNOTATION_CONTAINER).map(Into::into),
            inject_env: toggle(ANNOTATION_INJECT_ENV),
        })
    }

    /// Resolves where the model is mounted.
    ///
    /// * no override: `/models/<name>`
    /// * override containing `{name}`: the placeholder is substituted
    /// * any other override is a base directory, unless it already ends with the model name
    pub fn mount_path(&self, model_name: &str) -> String {
        match self.mount_path.as_deref() {
            None => name::default_mount_path(model_name),
            Some(path) if path.contains(PLACEHOLDER_NAME) => {
                path.replace(PLACEHOLDER_NAME, model_name)
            }
            Some(path) if path.ends_with(model_name) => path.into(),
            Some(path) => format!("{}/{model_name}", path.trim_end_matches('/')),
        }
    }
}
