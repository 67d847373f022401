use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema, CustomResource)]
#[kube(
    group = "models.main-currents.news",
    version = "v1alpha1",
    kind = "Model",
    root = "ModelCrd",
    status = "ModelStatus",
    shortname = "mdl",
    namespaced,
    printcolumn = r#"{
        "name": "phase",
        "type": "string",
        "description": "phase of the model",
        "jsonPath": ".status.phase"
    }"#,
    printcolumn = r#"{
        "name": "version",
        "type": "string",
        "description": "model version",
        "jsonPath": ".spec.version"
    }"#,
    printcolumn = r#"{
        "name": "size",
        "type": "string",
        "description": "requested storage size",
        "jsonPath": ".spec.storage.size"
    }"#,
    printcolumn = r#"{
        "name": "created-at",
        "type": "date",
        "description": "created time",
        "jsonPath": ".metadata.creationTimestamp"
    }"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub source: ModelSource,
    pub storage: ModelStorageSpec,
    #[serde(default)]
    pub modelfile: Option<ModelfileSpec>,
    #[serde(default)]
    pub version: Option<String>,
    /// Secret holding download credentials.
    ///
    /// * HuggingFace: `HF_TOKEN`
    /// * S3: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    /// * Git: `GIT_USERNAME`, `GIT_PASSWORD`
    #[serde(default)]
    pub credentials_secret: Option<String>,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
}

impl ModelCrd {
    /// Returns the observed phase, treating an empty status as [`ModelPhase::Pending`].
    pub fn phase(&self) -> ModelPhase {
        self.status
            .as_ref()
            .and_then(|status| status.phase)
            .unwrap_or_default()
    }
}

/// Where to download the model from.
///
/// Exactly one member must be set; use [`ModelSource::resolve`] to get it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelSource {
    #[serde(default)]
    pub hugging_face: Option<HuggingFaceSource>,
    #[serde(default)]
    pub url: Option<UrlSource>,
    #[serde(default)]
    pub s3: Option<S3Source>,
    #[serde(default)]
    pub git: Option<GitSource>,
}

impl ModelSource {
    pub fn resolve(&self) -> Result<ModelSourceKind<'_>, SourceError> {
        match (&self.hugging_face, &self.url, &self.s3, &self.git) {
            (Some(source), None, None, None) => Ok(ModelSourceKind::HuggingFace(source)),
            (None, Some(source), None, None) => Ok(ModelSourceKind::Url(source)),
            (None, None, Some(source), None) => Ok(ModelSourceKind::S3(source)),
            (None, None, None, Some(source)) => Ok(ModelSourceKind::Git(source)),
            (None, None, None, None) => Err(SourceError::Missing),
            (hugging_face, url, s3, git) => Err(SourceError::Ambiguous(
                [
                    (hugging_face.is_some(), ModelSourceKind::TYPE_HUGGING_FACE),
                    (url.is_some(), ModelSourceKind::TYPE_URL),
                    (s3.is_some(), ModelSourceKind::TYPE_S3),
                    (git.is_some(), ModelSourceKind::TYPE_GIT),
                ]
                .into_iter()
                .filter_map(|(populated, name)| populated.then_some(name))
                .collect(),
            )),
        }
    }
}

impl From<HuggingFaceSource> for ModelSource {
    fn from(source: HuggingFaceSource) -> Self {
        Self {
            hugging_face: Some(source),
            ..Default::default()
        }
    }
}

impl From<UrlSource> for ModelSource {
    fn from(source: UrlSource) -> Self {
        Self {
            url: Some(source),
            ..Default::default()
        }
    }
}

impl From<S3Source> for ModelSource {
    fn from(source: S3Source) -> Self {
        Self {
            s3: Some(source),
            ..Default::default()
        }
    }
}

impl From<GitSource> for ModelSource {
    fn from(source: GitSource) -> Self {
        Self {
            git: Some(source),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ModelSourceKind<'a> {
    HuggingFace(&'a HuggingFaceSource),
    Url(&'a UrlSource),
    S3(&'a S3Source),
    Git(&'a GitSource),
}

impl ModelSourceKind<'_> {
    pub const TYPE_HUGGING_FACE: &'static str = "huggingface";
    pub const TYPE_URL: &'static str = "url";
    pub const TYPE_S3: &'static str = "s3";
    pub const TYPE_GIT: &'static str = "git";

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::HuggingFace(_) => Self::TYPE_HUGGING_FACE,
            Self::Url(_) => Self::TYPE_URL,
            Self::S3(_) => Self::TYPE_S3,
            Self::Git(_) => Self::TYPE_GIT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("no source specified")]
    Missing,
    #[error("exactly one source must be specified, but given: {}", .0.join(", "))]
    Ambiguous(Vec<&'static str>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HuggingFaceSource {
    /// Repository ID, e.g. `meta-llama/Llama-3.1-8B-Instruct`
    #[schemars(regex(pattern = r"^[a-zA-Z0-9_.-]+/[a-zA-Z0-9_.-]+$"))]
    pub repo_id: String,
    /// Branch, tag or commit hash
    #[serde(default = "default_ref")]
    pub revision: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl HuggingFaceSource {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: default_ref(),
            include: Vec::default(),
            exclude: Vec::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlSource {
    #[schemars(regex(pattern = r"^https?://"))]
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Source {
    pub bucket: String,
    /// Object key or prefix
    pub key: String,
    /// Endpoint of an S3-compatible storage, e.g. MinIO
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    #[serde(default = "default_ref", rename = "ref")]
    pub ref_: String,
    #[serde(default = "GitSource::default_lfs")]
    pub lfs: bool,
    /// Shallow clone depth; `0` clones the full history
    #[serde(default = "GitSource::default_depth")]
    pub depth: u32,
    /// Sparse checkout patterns
    #[serde(default)]
    pub include: Vec<String>,
    /// Patterns removed after checkout
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl GitSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ref_: default_ref(),
            lfs: Self::default_lfs(),
            depth: Self::default_depth(),
            include: Vec::default(),
            exclude: Vec::default(),
        }
    }

    const fn default_lfs() -> bool {
        true
    }

    const fn default_depth() -> u32 {
        1
    }
}

fn default_ref() -> String {
    "main".into()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelStorageSpec {
    pub storage_class: String,
    #[schemars(regex(pattern = r"^[0-9]+[KMGTPE]i?$"))]
    pub size: String,
    #[serde(default = "ModelStorageSpec::default_access_modes")]
    pub access_modes: Vec<String>,
}

impl ModelStorageSpec {
    pub fn new(storage_class: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            storage_class: storage_class.into(),
            size: size.into(),
            access_modes: Self::default_access_modes(),
        }
    }

    fn default_access_modes() -> Vec<String> {
        vec!["ReadWriteOnce".into()]
    }
}

/// Ollama-style Modelfile written next to the downloaded artifacts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelfileSpec {
    /// Overrides the `FROM` directive (default: `/models`)
    #[serde(default)]
    pub from: Option<String>,
    /// Overrides the `HUGGINGFACE_PATH` comment
    #[serde(default)]
    pub hugging_face_path: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub parameters: Option<ModelParameters>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub top_p: Option<String>,
    #[serde(default)]
    pub top_k: Option<i32>,
    #[serde(default)]
    pub repeat_penalty: Option<String>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub num_ctx: Option<i32>,
    #[serde(default)]
    pub num_gpu: Option<i32>,
    #[serde(default)]
    pub seed: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    #[serde(default)]
    pub phase: Option<ModelPhase>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub progress: u8,
    #[serde(default)]
    pub pvc_name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Default,
    EnumString,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum ModelPhase {
    #[default]
    Pending,
    Downloading,
    Ready,
    Failed,
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;
    use serde_json::json;

    use super::*;

    #[test]
    fn resolve_single_source() {
        let source = ModelSource::from(HuggingFaceSource::new("meta-llama/Llama-3.1-8B"));
        match source.resolve() {
            Ok(ModelSourceKind::HuggingFace(source)) => {
                assert_eq!(source.repo_id, "meta-llama/Llama-3.1-8B");
                assert_eq!(source.revision, "main");
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn resolve_missing_source() {
        assert_eq!(
            ModelSource::default().resolve(),
            Err(SourceError::Missing),
        );
    }

    #[test]
    fn resolve_ambiguous_source() {
        let source = ModelSource {
            url: Some(UrlSource {
                url: "https://example.com/model.gguf".into(),
            }),
            git: Some(GitSource::new("https://example.com/model.git")),
            ..Default::default()
        };
        assert_eq!(
            source.resolve(),
            Err(SourceError::Ambiguous(vec!["url", "git"])),
        );
    }

    #[test]
    fn deserialize_spec_with_defaults() {
        let spec: ModelSpec = serde_json::from_value(json!({
            "source": {
                "git": {
                    "url": "https://huggingface.co/org/model",
                },
            },
            "storage": {
                "storageClass": "longhorn",
                "size": "20Gi",
            },
        }))
        .unwrap();

        let git = spec.source.git.as_ref().unwrap();
        assert_eq!(git.ref_, "main");
        assert!(git.lfs);
        assert_eq!(git.depth, 1);
        assert_eq!(spec.storage.access_modes, vec!["ReadWriteOnce"]);
        assert!(spec.node_selector.is_empty());
    }

    #[test]
    fn phase_defaults_to_pending() {
        let model = ModelCrd::new(
            "m1",
            ModelSpec {
                source: UrlSource {
                    url: "https://example.com/m1".into(),
                }
                .into(),
                storage: ModelStorageSpec::new("standard", "1Gi"),
                modelfile: None,
                version: None,
                credentials_secret: None,
                node_selector: BTreeMap::default(),
            },
        );
        assert_eq!(model.phase(), ModelPhase::Pending);
        assert_eq!(ModelPhase::Downloading.to_string(), "Downloading");
    }

    #[test]
    fn crd_is_namespaced_with_status() {
        let crd = ModelCrd::crd();
        assert_eq!(crd.spec.group, "models.main-currents.news");
        assert_eq!(crd.spec.names.kind, "Model");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert!(crd.spec.versions[0]
            .subresources
            .as_ref()
            .and_then(|subresources| subresources.status.as_ref())
            .is_some());
    }
}
