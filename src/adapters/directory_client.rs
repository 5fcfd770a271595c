use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::{Client, StatusCode};

use crate::{
    config::RegistryConfig,
    core::ServiceRecord,
    ports::directory::{DirectoryError, DirectoryResult, ServiceDirectory},
};

/// Service directory reached over HTTP: `GET {base_url}/services` returning a
/// JSON array of `{name, url}` objects.
pub struct HttpDirectoryClient {
    services_url: String,
    client: Client,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build directory HTTP client")?;

        Ok(Self {
            services_url: format!("{}/services", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn services_url(&self) -> &str {
        &self.services_url
    }

    fn connectivity(&self, err: &reqwest::Error) -> DirectoryError {
        DirectoryError::Connectivity {
            url: self.services_url.clone(),
            message: err.to_string(),
        }
    }

    fn protocol(&self, message: String) -> DirectoryError {
        DirectoryError::Protocol {
            url: self.services_url.clone(),
            message,
        }
    }
}

#[async_trait]
impl ServiceDirectory for HttpDirectoryClient {
    async fn fetch_services(&self) -> DirectoryResult<Vec<ServiceRecord>> {
        tracing::debug!("Fetching services from {}", self.services_url);

        let response = self
            .client
            .get(&self.services_url)
            .send()
            .await
            .map_err(|e| self.connectivity(&e))?;

        if response.status() != StatusCode::OK {
            return Err(self.protocol(format!(
                "expected 200 OK, got {}",
                response.status()
            )));
        }

        // a timeout while reading the body is still a transport failure
        response.json::<Vec<ServiceRecord>>().await.map_err(|e| {
            if e.is_decode() {
                self.protocol(format!("malformed service list: {e}"))
            } else {
                self.connectivity(&e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::get};
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_services_url_trims_trailing_slash() {
        let client = HttpDirectoryClient::new("http://registry:8081/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.services_url(), "http://registry:8081/services");
    }

    #[tokio::test]
    async fn test_fetch_services() {
        let app = Router::new().route(
            "/services",
            get(|| async {
                Json(vec![
                    ServiceRecord::new("users", "http://users:8080"),
                    ServiceRecord::new("orders", "http://orders:8080"),
                ])
            }),
        );
        let base = serve(app).await;

        let client = HttpDirectoryClient::new(&base, Duration::from_secs(5)).unwrap();
        let services = client.fetch_services().await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0], ServiceRecord::new("users", "http://users:8080"));
    }

    #[tokio::test]
    async fn test_non_200_is_protocol_error() {
        let app = Router::new().route(
            "/services",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let client = HttpDirectoryClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.fetch_services().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_protocol_error() {
        let app = Router::new().route(
            "/services",
            get(|| async { r#"{"services": "nope"}"# }),
        );
        let base = serve(app).await;

        let client = HttpDirectoryClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.fetch_services().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_is_connectivity_error() {
        // grab a free port, then close it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpDirectoryClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.fetch_services().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Connectivity { .. }));
    }
}
