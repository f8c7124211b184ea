//! HTTPS scrape endpoint.
//!
//! Every request must carry valid Basic credentials; only then is the path
//! looked at. `GET /metrics` returns the current registry snapshot in the
//! Prometheus text format. Every other path, and `/metrics` with a query
//! string, is a 404; other methods on `/metrics`, HEAD included, get a 405.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::tls_openssl::OpenSSLConfig;
use axum_server::Handle;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::auth::BasicAuth;
use crate::error::ExporterError;
use crate::metrics::FileMetrics;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
/// Challenge sent with every 401.
pub const CHALLENGE: &str = "Basic realm=\"S3 Exporter\"";

#[derive(Clone)]
struct ScrapeState {
    metrics: FileMetrics,
    auth: Arc<BasicAuth>,
}

/// Serves the registry to authenticated scrapers.
#[derive(Clone)]
pub struct ScrapeServer {
    state: ScrapeState,
}

impl ScrapeServer {
    pub fn new(metrics: FileMetrics, auth: BasicAuth) -> Self {
        ScrapeServer {
            state: ScrapeState {
                metrics,
                auth: Arc::new(auth),
            },
        }
    }

    /// Routes with authentication applied to all of them, fallback included.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler).head(method_not_allowed))
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_basic_auth,
            ))
            .with_state(self.state.clone())
    }

    /// Serves HTTPS on `addr` until the process exits.
    pub async fn serve(self, addr: SocketAddr, acceptor: SslAcceptor) -> Result<(), ExporterError> {
        self.serve_with_handle(addr, acceptor, Handle::new()).await
    }

    /// Like [`ScrapeServer::serve`], reporting the bound address through `handle`.
    pub async fn serve_with_handle(
        self,
        addr: SocketAddr,
        acceptor: SslAcceptor,
        handle: Handle,
    ) -> Result<(), ExporterError> {
        let config = OpenSSLConfig::from_acceptor(Arc::new(acceptor));
        info!("Prometheus exporter running on {} with HTTPS and Basic Auth", addr);

        axum_server::bind_openssl(addr, config)
            .handle(handle)
            .serve(self.router().into_make_service())
            .await
            .map_err(|e| ExporterError::Bind {
                address: addr.to_string(),
                source: e,
            })
    }
}

/// Builds the TLS acceptor from PEM files.
///
/// Fails when either path is missing, a file cannot be read, or the key
/// does not belong to the certificate.
pub fn load_tls(cert: Option<&Path>, key: Option<&Path>) -> Result<SslAcceptor, ExporterError> {
    let cert = cert.ok_or_else(|| ExporterError::Tls {
        details: "SSL_CERT_FILE is not set".to_string(),
    })?;
    let key = key.ok_or_else(|| ExporterError::Tls {
        details: "SSL_KEY_FILE is not set".to_string(),
    })?;

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;
    builder
        .set_certificate_chain_file(cert)
        .map_err(|e| ExporterError::Tls {
            details: format!("cannot load certificate {}: {}", cert.display(), e),
        })?;
    builder
        .set_private_key_file(key, SslFiletype::PEM)
        .map_err(|e| ExporterError::Tls {
            details: format!("cannot load private key {}: {}", key.display(), e),
        })?;
    builder.check_private_key().map_err(|e| ExporterError::Tls {
        details: format!("private key does not match certificate: {}", e),
    })?;

    Ok(builder.build())
}

async fn require_basic_auth(
    State(state): State<ScrapeState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| state.auth.verify(value))
        .unwrap_or(false);

    if !authorized {
        debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return unauthorized();
    }
    next.run(request).await
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
    )
        .into_response()
}

async fn metrics_handler(State(state): State<ScrapeState>, uri: Uri) -> Response {
    if uri.query().is_some() {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE))],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

// axum answers HEAD from the GET handler unless HEAD has its own.
async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static("GET"))],
    )
        .into_response()
}
