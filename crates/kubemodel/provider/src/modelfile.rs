//! Ollama-style `Modelfile` written next to the downloaded artifacts.

use kubemodel_api::model::{ModelParameters, ModelSourceKind, ModelfileSpec};

use crate::consts::MOUNT_PATH;

pub fn build_modelfile(source: &ModelSourceKind<'_>, spec: Option<&ModelfileSpec>) -> String {
    let mut lines = Vec::default();

    // source comment
    let hugging_face_path = spec
        .and_then(|spec| spec.hugging_face_path.clone())
        .filter(|path| !path.is_empty())
        .or_else(|| match source {
            ModelSourceKind::HuggingFace(source) => {
                Some(format!("huggingface.co/{}", source.repo_id))
            }
            _ => None,
        });
    match (hugging_face_path, source) {
        (Some(path), _) => lines.push(format!("# HUGGINGFACE_PATH {path}")),
        (None, ModelSourceKind::Git(source)) => {
            lines.push(format!("# GIT_URL {}", source.url));
            if !source.ref_.is_empty() {
                lines.push(format!("# GIT_REF {}", source.ref_));
            }
        }
        (None, ModelSourceKind::Url(source)) => {
            lines.push(format!("# SOURCE_URL {}", source.url));
        }
        (None, ModelSourceKind::S3(source)) => {
            lines.push(format!("# S3_PATH s3://{}/{}", source.bucket, source.key));
        }
        (None, ModelSourceKind::HuggingFace(_)) => {}
    }

    let from = spec
        .and_then(|spec| spec.from.as_deref())
        .filter(|from| !from.is_empty())
        .unwrap_or(MOUNT_PATH);
    lines.push(format!("FROM {from}"));

    if let Some(spec) = spec {
        if let Some(template) = spec.template.as_deref().filter(|s| !s.is_empty()) {
            lines.push(String::default());
            lines.push(format!("TEMPLATE \"\"\"{template}\"\"\""));
        }
        if let Some(system) = spec.system.as_deref().filter(|s| !s.is_empty()) {
            lines.push(String::default());
            lines.push(format!("SYSTEM \"\"\"{system}\"\"\""));
        }
        if let Some(parameters) = &spec.parameters {
            lines.push(String::default());
            lines.extend(build_parameters(parameters));
        }
    }

    lines.join("\n")
}

fn build_parameters(parameters: &ModelParameters) -> impl '_ + Iterator<Item = String> {
    let ModelParameters {
        temperature,
        top_p,
        top_k,
        repeat_penalty,
        stop,
        num_ctx,
        num_gpu,
        seed,
    } = parameters;

    [
        temperature.clone().map(|value| ("temperature", value)),
        top_p.clone().map(|value| ("top_p", value)),
        top_k.map(|value| ("top_k", value.to_string())),
        repeat_penalty.clone().map(|value| ("repeat_penalty", value)),
        num_ctx.map(|value| ("num_ctx", value.to_string())),
        num_gpu.map(|value| ("num_gpu", value.to_string())),
        seed.map(|value| ("seed", value.to_string())),
    ]
    .into_iter()
    .flatten()
    .map(|(key, value)| format!("PARAMETER {key} {value}"))
    .chain(stop.iter().map(|stop| format!("PARAMETER stop \"{stop}\"")))
}

#[cfg(test)]
mod tests {
    use kubemodel_api::model::{GitSource, HuggingFaceSource, S3Source, UrlSource};

    use super::*;

    #[test]
    fn build_hugging_face_default() {
        let source = HuggingFaceSource::new("meta-llama/Llama-3.1-8B");
        assert_eq!(
            build_modelfile(&ModelSourceKind::HuggingFace(&source), None),
            "# HUGGINGFACE_PATH huggingface.co/meta-llama/Llama-3.1-8B\nFROM /models",
        );
    }

    #[test]
    fn build_source_comments() {
        let git = GitSource::new("https://example.com/model.git");
        assert_eq!(
            build_modelfile(&ModelSourceKind::Git(&git), None),
            "# GIT_URL https://example.com/model.git\n# GIT_REF main\nFROM /models",
        );

        let url = UrlSource {
            url: "https://example.com/model.gguf".into(),
        };
        assert_eq!(
            build_modelfile(&ModelSourceKind::Url(&url), None),
            "# SOURCE_URL https://example.com/model.gguf\nFROM /models",
        );

        let s3 = S3Source {
            bucket: "artifacts".into(),
            key: "llama".into(),
            endpoint: None,
            region: None,
        };
        assert_eq!(
            build_modelfile(&ModelSourceKind::S3(&s3), None),
            "# S3_PATH s3://artifacts/llama\nFROM /models",
        );
    }

    #[test]
    fn build_with_overrides_and_parameters() {
        let git = GitSource::new("https://example.com/model.git");
        let spec = ModelfileSpec {
            from: Some("/models/model.gguf".into()),
            hugging_face_path: Some("huggingface.co/org/model".into()),
            template: Some("{{ .Prompt }}".into()),
            system: Some("You are a helpful assistant.".into()),
            parameters: Some(ModelParameters {
                temperature: Some("0.7".into()),
                top_k: Some(40),
                stop: vec!["<|eot_id|>".into()],
                ..Default::default()
            }),
        };

        assert_eq!(
            build_modelfile(&ModelSourceKind::Git(&git), Some(&spec)),
            [
                "# HUGGINGFACE_PATH huggingface.co/org/model",
                "FROM /models/model.gguf",
                "",
                "TEMPLATE \"\"\"{{ .Prompt }}\"\"\"",
                "",
                "SYSTEM \"\"\"You are a helpful assistant.\"\"\"",
                "",
                "PARAMETER temperature 0.7",
                "PARAMETER top_k 40",
                "PARAMETER stop \"<|eot_id|>\"",
            ]
            .join("\n"),
        );
    }
}
