use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON reply from the verification service.
///
/// A lookup the service answers with a JSON 404 arrives here with
/// `success == false`. Transport problems and every other error status are
/// [`BackendError`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub success: bool,
    pub body: Value,
}

impl BackendReply {
    pub fn from_body(body: Value) -> Self {
        let success = body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self { success, body }
    }
}

/// Product search criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    #[serde(rename = "productName", skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(rename = "LTONumber", skip_serializing_if = "Option::is_none")]
    pub lto_number: Option<String>,
    #[serde(rename = "CFPRNumber", skip_serializing_if = "Option::is_none")]
    pub cfpr_number: Option<String>,
    #[serde(rename = "brandName", skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

impl ProductQuery {
    pub fn by_name<S: Into<String>>(name: S) -> Self {
        Self {
            product_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.lto_number.is_none()
            && self.cfpr_number.is_none()
            && self.brand_name.is_none()
            && self.manufacturer.is_none()
    }
}

/// Label text submitted for AI product identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrScanRequest {
    pub block_of_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_image_url: Option<String>,
}

impl OcrScanRequest {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            block_of_text: text.into(),
            front_image_url: None,
            back_image_url: None,
        }
    }
}

/// Remote verification service.
///
/// Implementations must not retry internally; the dispatcher applies its own
/// timeout to every call.
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    async fn get_certificate_by_id(&self, certificate_id: &str)
        -> Result<BackendReply, BackendError>;

    async fn get_certificate_pdf_url(
        &self,
        certificate_id: &str,
    ) -> Result<BackendReply, BackendError>;

    async fn search_product(&self, query: &ProductQuery) -> Result<BackendReply, BackendError>;

    async fn scan_product_ocr(&self, request: &OcrScanRequest)
        -> Result<BackendReply, BackendError>;

    /// `Ok(true)` only when the service answers and reports itself healthy
    async fn health_check(&self) -> Result<bool, BackendError>;

    /// Whether a resolved document URL actually serves a document
    async fn document_exists(&self, url: &str) -> Result<bool, BackendError>;
}
