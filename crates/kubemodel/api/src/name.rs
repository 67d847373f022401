//! Derived resource names of a model.
//!
//! These are shared with existing deployments, so they must never change.

const PREFIX_STORAGE_CLAIM: &str = "model-";
const PREFIX_JOB: &str = "model-download-";
const PREFIX_VOLUME: &str = "model-";
const PREFIX_ENV: &str = "MODEL_";
const PREFIX_MOUNT_PATH: &str = "/models/";

pub fn storage_claim_name(model_name: &str) -> String {
    format!("{PREFIX_STORAGE_CLAIM}{model_name}")
}

pub fn job_name(model_name: &str) -> String {
    format!("{PREFIX_JOB}{model_name}")
}

pub fn volume_name(model_name: &str) -> String {
    format!("{PREFIX_VOLUME}{model_name}")
}

/// `llama-3-8b` => `MODEL_LLAMA_3_8B`
pub fn env_prefix(model_name: &str) -> String {
    let name = model_name.to_uppercase().replace('-', "_");
    format!("{PREFIX_ENV}{name}")
}

pub fn default_mount_path(model_name: &str) -> String {
    format!("{PREFIX_MOUNT_PATH}{model_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_resource_names() {
        assert_eq!(storage_claim_name("llama-3-8b"), "model-llama-3-8b");
        assert_eq!(job_name("llama-3-8b"), "model-download-llama-3-8b");
        assert_eq!(volume_name("llama-3-8b"), "model-llama-3-8b");
        assert_eq!(default_mount_path("llama-3-8b"), "/models/llama-3-8b");
    }

    #[test]
    fn derive_env_prefix() {
        assert_eq!(env_prefix("Mistral-7B"), "MODEL_MISTRAL_7B");
        assert_eq!(env_prefix("llama-3-8b"), "MODEL_LLAMA_3_8B");
        assert_eq!(env_prefix("m1"), "MODEL_M1");
    }
}
