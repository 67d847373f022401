use kubemodel_api::model::{GitSource, HuggingFaceSource, ModelSourceKind, S3Source, UrlSource};
use serde::Serialize;
use tera::{Context, Tera};

use crate::{consts::MOUNT_PATH, BuildError};

const TEMPLATE_HUGGING_FACE: &str = "huggingface.sh.j2";
const TEMPLATE_URL: &str = "url.sh.j2";
const TEMPLATE_S3: &str = "s3.sh.j2";
const TEMPLATE_GIT: &str = "git.sh.j2";

fn load_templates() -> Result<Tera, BuildError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (
            TEMPLATE_HUGGING_FACE,
            include_str!("./templates/huggingface.sh.j2"),
        ),
        (TEMPLATE_URL, include_str!("./templates/url.sh.j2")),
        (TEMPLATE_S3, include_str!("./templates/s3.sh.j2")),
        (TEMPLATE_GIT, include_str!("./templates/git.sh.j2")),
    ])?;
    Ok(tera)
}

/// Renders the shell script run by the download container.
///
/// `modelfile` is written next to the artifacts for the sources that ship one.
pub(crate) fn render(source: &ModelSourceKind<'_>, modelfile: &str) -> Result<String, BuildError> {
    let tera = load_templates()?;
    let rendered = match *source {
        ModelSourceKind::HuggingFace(source) => render_template(
            &tera,
            TEMPLATE_HUGGING_FACE,
            &HuggingFaceArgs {
                mount_path: MOUNT_PATH,
                modelfile,
                source,
            },
        ),
        ModelSourceKind::Url(source) => render_template(
            &tera,
            TEMPLATE_URL,
            &UrlArgs {
                mount_path: MOUNT_PATH,
                source,
            },
        ),
        ModelSourceKind::S3(source) => render_template(
            &tera,
            TEMPLATE_S3,
            &S3Args {
                mount_path: MOUNT_PATH,
                source,
            },
        ),
        ModelSourceKind::Git(source) => render_template(
            &tera,
            TEMPLATE_GIT,
            &GitArgs {
                mount_path: MOUNT_PATH,
                modelfile,
                git_ref: &source.ref_,
                source,
            },
        ),
    }?;
    Ok(rendered.trim_end().to_string())
}

fn render_template<T>(tera: &Tera, name: &str, args: &T) -> Result<String, BuildError>
where
    T: Serialize,
{
    let context = Context::from_serialize(args)?;
    tera.render(name, &context).map_err(Into::into)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HuggingFaceArgs<'a> {
    mount_path: &'a str,
    modelfile: &'a str,
    #[serde(flatten)]
    source: &'a HuggingFaceSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UrlArgs<'a> {
    mount_path: &'a str,
    #[serde(flatten)]
    source: &'a UrlSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct S3Args<'a> {
    mount_path: &'a str,
    #[serde(flatten)]
    source: &'a S3Source,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GitArgs<'a> {
    mount_path: &'a str,
    modelfile: &'a str,
    git_ref: &'a str,
    #[serde(flatten)]
    source: &'a GitSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_hugging_face_with_patterns() {
        let source = HuggingFaceSource {
            include: vec!["*.safetensors".into(), "*.json".into()],
            exclude: vec!["*.bin".into()],
            ..HuggingFaceSource::new("meta-llama/Llama-3.1-8B")
        };
        let script = render(&ModelSourceKind::HuggingFace(&source), "FROM /models").unwrap();

        assert!(script.starts_with("pip install -q huggingface_hub hf_transfer && \\\n"));
        assert!(script.contains(
            "snapshot_download('meta-llama/Llama-3.1-8B', revision='main', local_dir='/models', \
             allow_patterns=['*.safetensors', '*.json'], ignore_patterns=['*.bin'])\" && \\\n"
        ));
        assert!(script.contains("<< 'MODELFILE_EOF'\nFROM /models\nMODELFILE_EOF\n"));
        assert!(script.ends_with("ls -la /models"));
    }

    #[test]
    fn render_hugging_face_without_patterns() {
        let source = HuggingFaceSource::new("org/model");
        let script = render(&ModelSourceKind::HuggingFace(&source), "FROM /models").unwrap();

        assert!(script.contains("snapshot_download('org/model', revision='main', local_dir='/models')\""));
        assert!(!script.contains("allow_patterns"));
        assert!(!script.contains("ignore_patterns"));
    }

    #[test]
    fn render_s3_with_endpoint() {
        let source = S3Source {
            bucket: "artifacts".into(),
            key: "models/llama".into(),
            endpoint: Some("http://minio.minio:9000".into()),
            region: Some("us-east-1".into()),
        };
        let script = render(&ModelSourceKind::S3(&source), "").unwrap();

        assert!(script.starts_with(
            "aws s3 cp --endpoint-url http://minio.minio:9000 --region us-east-1 \
             s3://artifacts/models/llama /models/ --recursive && \\\n"
        ));
    }

    #[test]
    fn render_s3_without_endpoint() {
        let source = S3Source {
            bucket: "artifacts".into(),
            key: "llama".into(),
            endpoint: None,
            region: None,
        };
        let script = render(&ModelSourceKind::S3(&source), "").unwrap();

        assert!(script.starts_with("aws s3 cp s3://artifacts/llama /models/ --recursive"));
    }

    #[test]
    fn render_url() {
        let source = UrlSource {
            url: "https://example.com/llama.gguf".into(),
        };
        let script = render(&ModelSourceKind::Url(&source), "").unwrap();

        assert_eq!(
            script,
            "curl -L -o /models/model \"https://example.com/llama.gguf\" && \\\n\
             echo \"Download complete\" && \\\n\
             ls -la /models",
        );
    }

    #[test]
    fn render_git_shallow_clone() {
        let source = GitSource {
            ref_: "v1.0".into(),
            exclude: vec!["*.bin".into()],
            ..GitSource::new("https://huggingface.co/org/model")
        };
        let script = render(&ModelSourceKind::Git(&source), "FROM /models").unwrap();

        assert!(script.starts_with(
            "apk add --no-cache git-lfs && \\\n\
             git lfs install && \\\n\
             git clone --depth 1 --branch v1.0 https://huggingface.co/org/model /tmp/repo && \\\n\
             mv /tmp/repo/* /models/ && \\\n"
        ));
        assert!(script.contains("cd /models && \\\nrm -rf *.bin 2>/dev/null || true && \\\n"));
        assert!(!script.contains("sparse-checkout"));
        assert!(script.ends_with("echo \"Clone complete\" && \\\nls -la /models"));
    }

    #[test]
    fn render_git_sparse_checkout() {
        let source = GitSource {
            lfs: false,
            depth: 0,
            include: vec!["*.gguf".into(), "config.json".into()],
            ..GitSource::new("https://example.com/model.git")
        };
        let script = render(&ModelSourceKind::Git(&source), "FROM /models").unwrap();

        assert!(script.starts_with(
            "git clone --no-checkout --branch main https://example.com/model.git /tmp/repo && \\\n"
        ));
        assert!(script.contains(
            "git sparse-checkout init --no-cone && \\\n\
             echo '*.gguf' >> .git/info/sparse-checkout && \\\n\
             echo 'config.json' >> .git/info/sparse-checkout && \\\n\
             git checkout main && \\\n\
             cd / && \\\n"
        ));
        assert!(!script.contains("git-lfs"));
        assert!(!script.contains("--depth"));
    }
}
