use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tracing::Instrument;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Downstream HTTP client using Hyper with Rustls.
///
/// Sets `Host` from the target URI and converts bodies between Hyper and
/// Axum types. Status codes are passed through untouched; retrying lives in
/// the forwarder. One instance is shared by every request.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::info!("Created downstream HTTP client");
        Ok(Self { client })
    }

    fn host_header(req: &Request<AxumBody>) -> Option<HeaderValue> {
        let host = req.uri().host()?;
        let value = match req.uri().port() {
            Some(port) => HeaderValue::from_str(&format!("{host}:{}", port.as_u16())),
            None => HeaderValue::from_str(host),
        };
        value.ok()
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        let backend_identifier = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            req.uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );

        let span = tracing::info_span!(
            "backend_request",
            backend.url = %backend_identifier,
            http.method = %req.method(),
            http.path = %req.uri().path(),
            http.status_code = tracing::field::Empty,
        );

        match Self::host_header(&req) {
            Some(host) => {
                req.headers_mut().insert(header::HOST, host);
            }
            None => {
                tracing::error!("Outgoing URI has no host: {}", req.uri());
                return Err(HttpClientError::InvalidRequest(format!(
                    "Outgoing URI has no host: {}",
                    req.uri()
                )));
            }
        }

        let (mut parts, axum_body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let outgoing_request = Request::from_parts(parts, axum_body);

        let method_for_error_log = outgoing_request.method().clone();
        let uri_for_error_log = outgoing_request.uri().clone();
        let client = self.client.clone();

        async move {
            tracing::debug!(
                "Sending request: {} {}",
                outgoing_request.method(),
                outgoing_request.uri()
            );

            match client.request(outgoing_request).await {
                Ok(response) => {
                    tracing::Span::current().record("http.status_code", response.status().as_u16());

                    let (mut parts, hyper_body) = response.into_parts();
                    // the body is decoded here and re-framed by the inbound server
                    parts.headers.remove(header::TRANSFER_ENCODING);

                    Ok(Response::from_parts(parts, AxumBody::new(hyper_body)))
                }
                Err(e) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    tracing::debug!(
                        "Error making request to backend {} ({} {}): {}",
                        backend_identifier,
                        method_for_error_log,
                        uri_for_error_log,
                        e
                    );

                    Err(HttpClientError::ConnectionError(format!(
                        "Request to {method_for_error_log} {uri_for_error_log} failed: {e}"
                    )))
                }
            }
        }
        .instrument(span)
        .await
    }
}
