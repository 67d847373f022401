mod actix;
mod inject;
mod mutate;
mod options;
mod routes;

pub(crate) mod consts {
    pub const NAME: &str = "kubemodel-webhook";

    pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
    pub const ENV_TLS_CERT_FILE: &str = "TLS_CERT_FILE";
    pub const ENV_TLS_KEY_FILE: &str = "TLS_KEY_FILE";
}

#[tokio::main]
async fn main() {
    ::ark_core::tracer::init_once_as(self::consts::NAME);
    self::actix::loop_forever().await
}
