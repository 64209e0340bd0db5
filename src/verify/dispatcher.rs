use super::backend::{BackendReply, OcrScanRequest, ProductQuery, VerificationBackend};
use super::classify::{PayloadClassifier, ScanIntent};
use super::models::{
    CertificateStatus, ProductResult, VerificationFailure, VerificationOutcome,
};
use super::parse;
use crate::config::KioskConfig;
use crate::error::{BackendError, Result};
use crate::events::ControllerMessage;
use crate::ocr::{OcrPayload, TextExtractor};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const NO_LABEL_TEXT: &str = "No text could be read from the label. Please retake clearer photos.";
const NOT_IDENTIFIED: &str = "No results found. Please ensure the label is clear and try again.";

/// Classifies payloads and runs verification requests off the event loop.
///
/// Every dispatch spawns one worker task that posts exactly one
/// [`ControllerMessage::VerificationCompleted`] carrying the caller's
/// generation, whatever happens inside.
#[derive(Clone)]
pub struct VerificationDispatcher {
    inner: Arc<DispatcherCore>,
    completions: mpsc::Sender<ControllerMessage>,
}

struct DispatcherCore {
    backend: Arc<dyn VerificationBackend>,
    extractor: Arc<dyn TextExtractor>,
    classifier: PayloadClassifier,
    request_timeout: Duration,
    require_document_check: bool,
    label_separator: String,
}

impl VerificationDispatcher {
    pub fn new(
        config: &KioskConfig,
        backend: Arc<dyn VerificationBackend>,
        extractor: Arc<dyn TextExtractor>,
        completions: mpsc::Sender<ControllerMessage>,
    ) -> Result<Self> {
        let classifier = PayloadClassifier::new(&config.scan)?;
        Ok(Self {
            inner: Arc::new(DispatcherCore {
                backend,
                extractor,
                classifier,
                request_timeout: config.backend.request_timeout(),
                require_document_check: config.backend.require_document_check,
                label_separator: config.system.label_separator.clone(),
            }),
            completions,
        })
    }

    /// Verify a scanned payload in the background
    pub fn dispatch_scan(&self, generation: u64, payload: String) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        self.spawn(generation, async move { inner.verify_scan(&payload).await })
    }

    /// Verify a front/back label pair in the background
    pub fn dispatch_label(&self, generation: u64, payload: OcrPayload) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        self.spawn(generation, async move { inner.verify_label(payload).await })
    }

    fn spawn<F>(&self, generation: u64, work: F) -> JoinHandle<()>
    where
        F: Future<Output = VerificationOutcome> + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = work.await;
            info!(
                "Verification generation {} finished: {}",
                generation,
                outcome.kind()
            );
            if completions
                .send(ControllerMessage::VerificationCompleted {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                debug!("Controller queue closed, dropping verification result");
            }
        })
    }

    /// Run a scan verification inline. Used by workers and tests.
    pub async fn verify_scan(&self, payload: &str) -> VerificationOutcome {
        self.inner.verify_scan(payload).await
    }

    pub async fn verify_label(&self, payload: OcrPayload) -> VerificationOutcome {
        self.inner.verify_label(payload).await
    }
}

fn network_failure(err: BackendError) -> VerificationOutcome {
    warn!("Verification request failed ({}): {}", err.kind(), err);
    VerificationOutcome::Failed(VerificationFailure::Network {
        message: err.to_string(),
    })
}

impl DispatcherCore {
    /// Bound a backend call by the request timeout. A timeout is reported like
    /// any other transport failure.
    async fn call<T, F>(&self, request: F) -> std::result::Result<T, BackendError>
    where
        F: Future<Output = std::result::Result<T, BackendError>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                timeout: self.request_timeout,
            }),
        }
    }

    async fn verify_scan(&self, payload: &str) -> VerificationOutcome {
        match self.classifier.classify(payload) {
            ScanIntent::CertificateLookup { certificate_id } => {
                self.lookup_certificate(&certificate_id).await
            }
            ScanIntent::LedgerCertificate(certificate)
            | ScanIntent::EmbeddedCertificate(certificate) => {
                VerificationOutcome::Certificate(certificate)
            }
            ScanIntent::ProductSearch(query) => self.search_product(query).await,
            ScanIntent::EmbeddedProduct(product) => VerificationOutcome::Product(product),
            ScanIntent::TextSearch { text } => self.search_text(&text).await,
            ScanIntent::Unrecognized { payload } => {
                VerificationOutcome::Failed(VerificationFailure::unrecognized(&payload))
            }
        }
    }

    async fn lookup_certificate(&self, certificate_id: &str) -> VerificationOutcome {
        info!("Looking up certificate {}", certificate_id);
        let reply = match self
            .call(self.backend.get_certificate_by_id(certificate_id))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return network_failure(e),
        };

        if reply.success {
            let record = reply.body.get("certificate").cloned().unwrap_or(Value::Null);
            // The document link is optional decoration for a confirmed certificate
            let document_url = match self
                .call(self.backend.get_certificate_pdf_url(certificate_id))
                .await
            {
                Ok(pdf) if pdf.success => parse::document_url_from_reply(&pdf.body),
                Ok(_) => None,
                Err(e) => {
                    warn!("Could not resolve document for {}: {}", certificate_id, e);
                    None
                }
            };
            return VerificationOutcome::Certificate(parse::certificate_from_lookup(
                certificate_id,
                &record,
                document_url,
            ));
        }

        debug!(
            "Certificate {} not confirmed: {}",
            certificate_id,
            parse::reply_message(&reply.body).unwrap_or_default()
        );
        self.unconfirmed_certificate(certificate_id).await
    }

    /// A certificate the ledger could not confirm is `pending` when its
    /// document still resolves, `invalid` otherwise.
    async fn unconfirmed_certificate(&self, certificate_id: &str) -> VerificationOutcome {
        let pdf = match self
            .call(self.backend.get_certificate_pdf_url(certificate_id))
            .await
        {
            Ok(pdf) => pdf,
            Err(e) => return network_failure(e),
        };

        let document_url = if pdf.success {
            parse::document_url_from_reply(&pdf.body)
        } else {
            None
        };

        let status = match &document_url {
            None => CertificateStatus::Invalid,
            Some(_) if !self.require_document_check => CertificateStatus::Pending,
            Some(url) => match self.call(self.backend.document_exists(url)).await {
                Ok(true) => CertificateStatus::Pending,
                Ok(false) => {
                    warn!("Document for {} does not exist at {}", certificate_id, url);
                    CertificateStatus::Invalid
                }
                Err(e) => return network_failure(e),
            },
        };

        let record = pdf.body.get("certificate").cloned().unwrap_or(Value::Null);
        let mut certificate = parse::certificate_from_lookup(certificate_id, &record, None);
        certificate.status = status;
        certificate.chain = None;
        certificate.document_url = match status {
            CertificateStatus::Pending => document_url,
            _ => None,
        };
        VerificationOutcome::Certificate(certificate)
    }

    async fn search_product(&self, query: ProductQuery) -> VerificationOutcome {
        info!(
            "Searching product {}",
            query.product_name.as_deref().unwrap_or("<unnamed>")
        );
        let reply = match self.call(self.backend.search_product(&query)).await {
            Ok(reply) => reply,
            Err(e) => return network_failure(e),
        };

        // A zero-match search still succeeds; a rejected search is not a verdict
        if !reply.success {
            let message = parse::reply_message(&reply.body)
                .unwrap_or_else(|| "Verification service rejected the product search".to_string());
            warn!("Product search rejected: {}", message);
            return VerificationOutcome::Failed(VerificationFailure::Network { message });
        }

        match parse::product_from_search(&reply.body) {
            Some(product) => VerificationOutcome::Product(product),
            None => VerificationOutcome::Product(ProductResult::not_found(
                query.product_name.as_deref(),
                query.brand_name.as_deref(),
            )),
        }
    }

    /// Free text goes through AI extraction first; if that fails, the first
    /// line is searched as a product name.
    async fn search_text(&self, text: &str) -> VerificationOutcome {
        let reply = match self
            .call(self.backend.scan_product_ocr(&OcrScanRequest::text(text)))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return network_failure(e),
        };

        let query = if reply.success {
            parse::product_query_from_extraction(&reply.body)
        } else {
            None
        };

        let query = match query {
            Some(query) => query,
            None => {
                debug!("Label extraction found nothing, searching by first line");
                let first_line = text
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .unwrap_or(text);
                ProductQuery::by_name(first_line)
            }
        };

        self.search_product(query).await
    }

    async fn extract(&self, payload: &OcrPayload) -> std::result::Result<String, String> {
        let mut parts = Vec::with_capacity(2);
        for frame in [&payload.front, &payload.back] {
            let text = match tokio::time::timeout(
                self.request_timeout,
                self.extractor.extract_text(frame),
            )
            .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => return Err(e.to_string()),
                Err(_) => return Err("text extraction timed out".to_string()),
            };
            let text = text.trim().to_string();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        Ok(parts.join(self.label_separator.as_str()))
    }

    async fn verify_label(&self, payload: OcrPayload) -> VerificationOutcome {
        let text = match self.extract(&payload).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Label text extraction failed: {}", e);
                return VerificationOutcome::Failed(VerificationFailure::NotIdentified {
                    message: NO_LABEL_TEXT.to_string(),
                });
            }
        };
        if text.is_empty() {
            return VerificationOutcome::Failed(VerificationFailure::NotIdentified {
                message: NO_LABEL_TEXT.to_string(),
            });
        }

        info!("Submitting {} characters of label text", text.len());
        let reply: BackendReply = match self
            .call(self.backend.scan_product_ocr(&OcrScanRequest::text(text)))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return network_failure(e),
        };

        if !reply.success {
            let message = parse::reply_message(&reply.body)
                .unwrap_or_else(|| "Verification service rejected the label scan".to_string());
            warn!("Label scan rejected: {}", message);
            return VerificationOutcome::Failed(VerificationFailure::Network { message });
        }

        match parse::compliance_from_scan(&reply.body) {
            Some(report) => VerificationOutcome::Compliance(report),
            None => VerificationOutcome::Failed(VerificationFailure::NotIdentified {
                message: parse::reply_message(&reply.body)
                    .unwrap_or_else(|| NOT_IDENTIFIED.to_string()),
            }),
        }
    }
}
