use serde::{Deserialize, Serialize};
use std::fmt;

/// Certificate verification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Confirmed against the ledger
    Valid,
    /// Document located but not confirmed against the ledger
    Pending,
    Invalid,
}

impl CertificateStatus {
    /// Lenient parse of a status string found in scanned payloads
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "valid" | "verified" | "active" => CertificateStatus::Valid,
            "pending" => CertificateStatus::Pending,
            _ => CertificateStatus::Invalid,
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Valid => write!(f, "valid"),
            CertificateStatus::Pending => write!(f, "pending"),
            CertificateStatus::Invalid => write!(f, "invalid"),
        }
    }
}

/// Certificate record schema version. Version 2 records embed entity details
/// and the approver list; version 1 records carry only the hash anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1")]
    V1,
    #[serde(rename = "2")]
    V2,
}

impl SchemaVersion {
    /// "2", "2.0" and "2.1" are all version 2; anything unrecognised is version 1
    pub fn parse(raw: &str) -> Self {
        let major = raw.trim().trim_start_matches(['v', 'V']).split('.').next();
        match major.and_then(|m| m.parse::<u32>().ok()) {
            Some(n) if n >= 2 => SchemaVersion::V2,
            _ => SchemaVersion::V1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approver {
    pub name: String,
    pub wallet: Option<String>,
    /// Display-formatted approval date
    pub approved_on: String,
}

/// Ledger anchor details for a certificate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainAttributes {
    pub block_index: Option<u64>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub pdf_hash: Option<String>,
    pub approvers: Vec<Approver>,
}

impl ChainAttributes {
    pub fn is_empty(&self) -> bool {
        self.block_index.is_none()
            && self.block_hash.is_none()
            && self.transaction_hash.is_none()
            && self.pdf_hash.is_none()
            && self.approvers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateResult {
    pub certificate_id: String,
    /// Product and/or company names the certificate was issued to
    pub entity_names: Vec<String>,
    pub entity_type: Option<String>,
    pub certificate_type: Option<String>,
    pub status: CertificateStatus,
    pub document_url: Option<String>,
    pub issued_on: String,
    pub expires_on: String,
    pub chain: Option<ChainAttributes>,
    pub version: SchemaVersion,
}

impl CertificateResult {
    /// Headline name, "Unknown" when the record carries none
    pub fn primary_name(&self) -> &str {
        self.entity_names
            .first()
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

/// Which data source produced a product match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    InternalDatabase,
    GroundedSearchPdf,
    NotFound,
    QrCode,
}

impl Provenance {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "grounded_search_pdf" => Provenance::GroundedSearchPdf,
            "not_found" => Provenance::NotFound,
            "qr_code" => Provenance::QrCode,
            _ => Provenance::InternalDatabase,
        }
    }
}

pub const GROUNDED_SEARCH_NOTE: &str = "Found in official FDA registry (not in RCV database)";

pub const NOT_FOUND_WARNINGS: [&str; 3] = [
    "Product NOT found in RCV database",
    "Product NOT found in official FDA registry",
    "This product may be counterfeit or unregistered",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    pub product_name: String,
    pub brand_name: String,
    pub manufacturer: Option<String>,
    pub batch_number: String,
    pub lto_number: Option<String>,
    pub cfpr_number: Option<String>,
    pub registered_on: String,
    pub expires_on: String,
    pub is_authentic: bool,
    /// Match confidence in [0, 1]
    pub confidence: f64,
    pub provenance: Provenance,
    pub warnings: Vec<String>,
}

impl ProductResult {
    /// Result for a product search that matched nothing
    pub fn not_found(product_name: Option<&str>, brand_name: Option<&str>) -> Self {
        Self {
            product_name: product_name.unwrap_or("Unknown").to_string(),
            brand_name: brand_name.unwrap_or("Unknown").to_string(),
            manufacturer: None,
            batch_number: "N/A".to_string(),
            lto_number: None,
            cfpr_number: None,
            registered_on: "N/A".to_string(),
            expires_on: "N/A".to_string(),
            is_authentic: false,
            confidence: 0.0,
            provenance: Provenance::NotFound,
            warnings: NOT_FOUND_WARNINGS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    Violation,
    Unknown,
}

impl ComplianceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLIANT" => ComplianceStatus::Compliant,
            "VIOLATION" => ComplianceStatus::Violation,
            _ => ComplianceStatus::Unknown,
        }
    }
}

/// Compliance of one regulatory field printed on the packaging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCompliance {
    /// Value on record, if the product is registered for this field
    pub required: Option<String>,
    pub found_on_packaging: bool,
    /// Value read off the packaging, when the backend reports one
    pub detected: Option<String>,
    pub status: ComplianceStatus,
}

impl FieldCompliance {
    pub fn unknown() -> Self {
        Self {
            required: None,
            found_on_packaging: false,
            detected: None,
            status: ComplianceStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub product_name: String,
    pub brand_name: Option<String>,
    pub manufacturer: Option<String>,
    pub is_compliant: bool,
    pub message: String,
    pub cfpr: FieldCompliance,
    pub lto: FieldCompliance,
    pub expiration_date: FieldCompliance,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Why a verification request produced no displayable result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationFailure {
    /// Transport error, timeout or HTTP error on a verification call
    Network { message: String },
    /// Payload did not match any known shape
    Unrecognized { payload_preview: String },
    /// Label scan did not identify any product
    NotIdentified { message: String },
    /// Backend replied with something we could not interpret
    Malformed { message: String },
}

impl VerificationFailure {
    pub fn unrecognized(payload: &str) -> Self {
        let preview: String = payload.chars().take(100).collect();
        VerificationFailure::Unrecognized {
            payload_preview: preview,
        }
    }

    /// Text shown on the error screen
    pub fn user_message(&self) -> String {
        match self {
            VerificationFailure::Network { message } => format!("Processing Error:\n{}", message),
            VerificationFailure::Unrecognized { payload_preview } => format!(
                "Unrecognized QR code format.\n\nData: {}...",
                payload_preview
            ),
            VerificationFailure::NotIdentified { message } => message.clone(),
            VerificationFailure::Malformed { message } => {
                format!("Unexpected server response:\n{}", message)
            }
        }
    }
}

/// The single completion produced for every dispatched request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Certificate(CertificateResult),
    Product(ProductResult),
    Compliance(ComplianceResult),
    Failed(VerificationFailure),
}

impl VerificationOutcome {
    /// Scan log `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationOutcome::Certificate(_) => "certificate",
            VerificationOutcome::Product(_) => "product",
            VerificationOutcome::Compliance(_) => "compliance",
            VerificationOutcome::Failed(_) => "error",
        }
    }
}
