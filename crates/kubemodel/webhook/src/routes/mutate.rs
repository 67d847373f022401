use actix_web::{
    post,
    web::{Data, Json},
    HttpResponse, Responder,
};
use kube::{
    core::{
        admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
        DynamicObject,
    },
    Client,
};
use kubemodel_provider::client::KubernetesModelClient;
use tracing::{instrument, warn, Level};

#[instrument(level = Level::INFO, skip_all)]
#[post("/mutate-v1-pod")]
pub async fn pod(
    kube: Data<Client>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl Responder {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(error) => {
            warn!("invalid admission review: {error}");
            return HttpResponse::Ok().json(AdmissionResponse::invalid(error).into_review());
        }
    };

    let client = KubernetesModelClient {
        kube: kube.get_ref(),
        field_manager: crate::consts::NAME,
    };
    let response = crate::mutate::mutate(&client, &request).await;
    HttpResponse::Ok().json(response.into_review())
}
