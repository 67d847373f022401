use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse},
    DynamicObject,
};
use kubemodel_api::{consts::LABEL_INJECTED, model::ModelPhase};
use kubemodel_provider::client::ModelClient;
use tracing::{debug, error, info, instrument, warn, Level};

use crate::{inject::inject_model, options::InjectionOptions};

const CODE_BAD_REQUEST: u16 = 400;
const CODE_INTERNAL_ERROR: u16 = 500;

enum Rejection {
    Deny(String),
    Error { code: u16, message: String },
}

/// Decides whether a pod is admitted, and how it is patched.
#[instrument(level = Level::INFO, skip_all, fields(uid = %request.uid, name = %request.name))]
pub async fn mutate<C>(client: &C, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse
where
    C: ModelClient,
{
    let response = AdmissionResponse::from(request);

    let object = match &request.object {
        Some(object) => object,
        None => return response,
    };
    let options = match InjectionOptions::from_metadata(&object.metadata) {
        Some(options) => options,
        None => {
            debug!("no injection requested");
            return response;
        }
    };
    let namespace = request
        .namespace
        .as_deref()
        .or(object.metadata.namespace.as_deref())
        .unwrap_or("default");

    match try_mutate(client, namespace, object, &options).await {
        Ok(patch) => match response.clone().with_patch(patch) {
            Ok(response) => {
                info!("injected models into pod: {:?}", &options.models);
                response
            }
            Err(error) => {
                error!("failed to serialize patch: {error}");
                errored(response, CODE_INTERNAL_ERROR, "internal error".into())
            }
        },
        Err(Rejection::Deny(reason)) => {
            warn!("denied: {reason}");
            response.deny(reason)
        }
        Err(Rejection::Error { code, message }) => {
            error!("{message}");
            errored(response, code, message)
        }
    }
}

async fn try_mutate<C>(
    client: &C,
    namespace: &str,
    object: &DynamicObject,
    options: &InjectionOptions,
) -> Result<::json_patch::Patch, Rejection>
where
    C: ModelClient,
{
    let decode_error = |error: ::serde_json::Error| Rejection::Error {
        code: CODE_BAD_REQUEST,
        message: format!("failed to decode pod: {error}"),
    };
    let encode_error = |error: ::serde_json::Error| Rejection::Error {
        code: CODE_INTERNAL_ERROR,
        message: format!("failed to encode pod: {error}"),
    };

    let mut pod: Pod = ::serde_json::to_value(object)
        .and_then(::serde_json::from_value)
        .map_err(decode_error)?;
    let original = ::serde_json::to_value(&pod).map_err(encode_error)?;

    for model_name in &options.models {
        let model = match client.load_model(namespace, model_name).await {
            Ok(Some(model)) => model,
            Ok(None) => {
                return Err(Rejection::Deny(format!("model {model_name:?} not found")));
            }
            Err(error) => {
                return Err(Rejection::Deny(format!(
                    "failed to load model {model_name:?}: {error}"
                )));
            }
        };

        let phase = model.phase();
        if phase != ModelPhase::Ready {
            return Err(Rejection::Deny(format!(
                "model {model_name:?} is not ready (phase: {phase})"
            )));
        }

        inject_model(&mut pod, &model, options).map_err(|error| {
            Rejection::Deny(format!("failed to inject model {model_name:?}: {error}"))
        })?;
    }

    pod.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(LABEL_INJECTED.into(), "true".into());

    let mutated = ::serde_json::to_value(&pod).map_err(encode_error)?;
    Ok(::json_patch::diff(&original, &mutated))
}

fn errored(response: AdmissionResponse, code: u16, message: String) -> AdmissionResponse {
    let mut response = response.deny(message);
    response.result.code = code;
    response
}
