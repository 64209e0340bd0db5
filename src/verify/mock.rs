use super::backend::{BackendReply, OcrScanRequest, ProductQuery, VerificationBackend};
use crate::error::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

type Scripted<T> = std::result::Result<T, BackendError>;

/// In-memory backend. Responses are queued per endpoint and consumed FIFO;
/// an empty queue answers with a connection error.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<HashMap<&'static str, VecDeque<Scripted<BackendReply>>>>,
    health: Mutex<VecDeque<Scripted<bool>>>,
    documents: Mutex<VecDeque<Scripted<bool>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps first
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn queue(&self, endpoint: &'static str, reply: Scripted<BackendReply>) {
        self.replies.lock().entry(endpoint).or_default().push_back(reply);
    }

    pub fn on_certificate(&self, body: Value) {
        self.queue("certificate", Ok(BackendReply::from_body(body)));
    }

    pub fn on_certificate_error(&self, err: BackendError) {
        self.queue("certificate", Err(err));
    }

    pub fn on_pdf(&self, body: Value) {
        self.queue("pdf", Ok(BackendReply::from_body(body)));
    }

    pub fn on_pdf_error(&self, err: BackendError) {
        self.queue("pdf", Err(err));
    }

    pub fn on_search(&self, body: Value) {
        self.queue("search", Ok(BackendReply::from_body(body)));
    }

    pub fn on_ocr(&self, body: Value) {
        self.queue("ocr", Ok(BackendReply::from_body(body)));
    }

    pub fn on_ocr_error(&self, err: BackendError) {
        self.queue("ocr", Err(err));
    }

    pub fn on_health(&self, healthy: Scripted<bool>) {
        self.health.lock().push_back(healthy);
    }

    pub fn on_document(&self, exists: Scripted<bool>) {
        self.documents.lock().push_back(exists);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn take(&self, endpoint: &'static str, call: String) -> Scripted<BackendReply> {
        self.calls.lock().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(no_response)
    }
}

fn no_response<T>() -> Scripted<T> {
    Err(BackendError::Connection {
        details: "no mock response".to_string(),
    })
}

#[async_trait]
impl VerificationBackend for MockBackend {
    async fn get_certificate_by_id(&self, certificate_id: &str) -> Scripted<BackendReply> {
        self.take("certificate", format!("certificate:{}", certificate_id))
            .await
    }

    async fn get_certificate_pdf_url(&self, certificate_id: &str) -> Scripted<BackendReply> {
        self.take("pdf", format!("pdf:{}", certificate_id)).await
    }

    async fn search_product(&self, query: &ProductQuery) -> Scripted<BackendReply> {
        let name = query.product_name.clone().unwrap_or_default();
        self.take("search", format!("search:{}", name)).await
    }

    async fn scan_product_ocr(&self, request: &OcrScanRequest) -> Scripted<BackendReply> {
        self.take("ocr", format!("ocr:{}", request.block_of_text))
            .await
    }

    async fn health_check(&self) -> Scripted<bool> {
        self.calls.lock().push("health".to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.health.lock().pop_front().unwrap_or_else(no_response)
    }

    async fn document_exists(&self, url: &str) -> Scripted<bool> {
        self.calls.lock().push(format!("document:{}", url));
        self.documents.lock().pop_front().unwrap_or_else(no_response)
    }
}
