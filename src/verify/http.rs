use super::backend::{BackendReply, OcrScanRequest, ProductQuery, VerificationBackend};
use crate::config::BackendConfig;
use crate::error::{BackendError, KioskError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// REST client for the verification API
#[derive(Clone)]
pub struct HttpBackend {
    base: String,
    client: Client,
    health_timeout: Duration,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| KioskError::component("backend", e.to_string()))?;

        Ok(Self {
            base: config.base_url.trim_end_matches('/').to_string(),
            client,
            health_timeout: config.health_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base, endpoint.trim_start_matches('/'))
    }

    /// Service root, which answers health probes
    fn root_url(&self) -> String {
        let root = self.base.strip_suffix("/api/v1").unwrap_or(&self.base);
        format!("{}/", root)
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                timeout: self.request_timeout,
            }
        } else if err.is_connect() {
            BackendError::Connection {
                details: err.to_string(),
            }
        } else if err.is_decode() {
            BackendError::Decode {
                details: err.to_string(),
            }
        } else {
            BackendError::Connection {
                details: err.to_string(),
            }
        }
    }

    /// A 404 with a JSON body is the service saying "not found" and comes back
    /// as a reply. Every other error status is a failed request.
    async fn into_reply(&self, response: Response) -> std::result::Result<BackendReply, BackendError> {
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(BackendError::Http {
                status: status.as_u16(),
                details: text.chars().take(200).collect(),
            });
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => {
                if !status.is_success() {
                    debug!("HTTP {} with JSON body from verification service", status);
                }
                Ok(BackendReply::from_body(body))
            }
            Err(e) if status.is_success() => Err(BackendError::Decode {
                details: e.to_string(),
            }),
            Err(_) => Err(BackendError::Http {
                status: status.as_u16(),
                details: text.chars().take(200).collect(),
            }),
        }
    }

    async fn get(&self, endpoint: &str) -> std::result::Result<BackendReply, BackendError> {
        let url = self.url(endpoint);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.into_reply(response).await
    }

    async fn post<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> std::result::Result<BackendReply, BackendError> {
        let url = self.url(endpoint);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.into_reply(response).await
    }
}

#[async_trait]
impl VerificationBackend for HttpBackend {
    async fn get_certificate_by_id(
        &self,
        certificate_id: &str,
    ) -> std::result::Result<BackendReply, BackendError> {
        self.get(&format!(
            "/certificate-blockchain/certificate/{}",
            certificate_id
        ))
        .await
    }

    async fn get_certificate_pdf_url(
        &self,
        certificate_id: &str,
    ) -> std::result::Result<BackendReply, BackendError> {
        self.get(&format!("/certificate-blockchain/pdf/{}", certificate_id))
            .await
    }

    async fn search_product(
        &self,
        query: &ProductQuery,
    ) -> std::result::Result<BackendReply, BackendError> {
        self.post("/scan/searchProduct", query).await
    }

    async fn scan_product_ocr(
        &self,
        request: &OcrScanRequest,
    ) -> std::result::Result<BackendReply, BackendError> {
        self.post("/scan/scanProduct", request).await
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        let response = self
            .client
            .get(self.root_url())
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(BackendReply::from_body(body).success),
            Err(e) => {
                warn!("Health check returned a non-JSON body: {}", e);
                Ok(false)
            }
        }
    }

    async fn document_exists(&self, url: &str) -> std::result::Result<bool, BackendError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(response.status().is_success())
    }
}
