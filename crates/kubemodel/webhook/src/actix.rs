use std::{fs::File, io::BufReader, net::SocketAddr, path::PathBuf};

use actix_web::{
    get,
    web::{Data, JsonConfig},
    App, HttpResponse, HttpServer, Responder,
};
use actix_web_opentelemetry::{RequestMetrics, RequestTracing};
use anyhow::{anyhow, bail, Result};
use ark_core::env::{infer, infer_or};
use kube::Client;
use rustls::ServerConfig;
use tracing::{error, info, instrument, Level};

use crate::consts::{ENV_BIND_ADDR, ENV_TLS_CERT_FILE, ENV_TLS_KEY_FILE};

const DEFAULT_ADDR_HTTP: &str = "0.0.0.0:8080";
const DEFAULT_ADDR_HTTPS: &str = "0.0.0.0:8443";

/// Admission reviews carry the whole object.
const PAYLOAD_LIMIT: usize = 4 * 1024 * 1024;

#[instrument(level = Level::INFO)]
#[get("/_health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

pub async fn loop_forever() {
    if let Err(error) = try_loop_forever().await {
        error!("failed to run http server: {error}")
    }
}

async fn try_loop_forever() -> Result<()> {
    let kube = Client::try_default().await?;
    let kube = Data::new(kube);

    let tls = load_tls_config()?;
    let default_addr = if tls.is_some() {
        DEFAULT_ADDR_HTTPS
    } else {
        DEFAULT_ADDR_HTTP
    };
    let addr: SocketAddr = infer_or(ENV_BIND_ADDR, default_addr.parse()?)?;

    // Start web server
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(Data::clone(&kube))
            .app_data(JsonConfig::default().limit(PAYLOAD_LIMIT));
        let app = app
            .service(health)
            .service(crate::routes::mutate::pod);
        app.wrap(RequestTracing::default())
            .wrap(RequestMetrics::default())
    });

    let server = match tls {
        Some(config) => {
            info!("listening on https://{addr}");
            server
                .bind_rustls_0_22(addr, config)
                .map_err(|error| anyhow!("failed to bind to {addr}: {error}"))?
        }
        None => {
            info!("listening on http://{addr}");
            server
                .bind(addr)
                .map_err(|error| anyhow!("failed to bind to {addr}: {error}"))?
        }
    };
    server.run().await.map_err(Into::into)
}

fn load_tls_config() -> Result<Option<ServerConfig>> {
    let cert_file = infer::<_, PathBuf>(ENV_TLS_CERT_FILE).ok();
    let key_file = infer::<_, PathBuf>(ENV_TLS_KEY_FILE).ok();

    let (cert_file, key_file) = match (cert_file, key_file) {
        (Some(cert_file), Some(key_file)) => (cert_file, key_file),
        (None, None) => return Ok(None),
        _ => bail!("both {ENV_TLS_CERT_FILE} and {ENV_TLS_KEY_FILE} should be set to enable TLS"),
    };

    let open = |path: &PathBuf| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|error| anyhow!("failed to open {}: {error}", path.display()))
    };

    let certs = ::rustls_pemfile::certs(&mut open(&cert_file)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| anyhow!("failed to parse certificates: {error}"))?;
    let key = ::rustls_pemfile::private_key(&mut open(&key_file)?)
        .map_err(|error| anyhow!("failed to parse private key: {error}"))?
        .ok_or_else(|| anyhow!("no private key found: {}", key_file.display()))?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map(Some)
        .map_err(|error| anyhow!("failed to build TLS config: {error}"))
}
