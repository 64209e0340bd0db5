use super::backend::ProductQuery;
use super::models::{CertificateResult, ProductResult};
use super::parse::{
    self, Fields, CERTIFICATE_ID_KEYS, CERTIFICATE_SHAPE_KEYS, PRODUCT_SEARCH_KEYS,
};
use crate::config::ScanConfig;
use crate::error::{KioskError, Result};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// What a scanned payload asks the kiosk to do
#[derive(Debug, Clone, PartialEq)]
pub enum ScanIntent {
    /// Look a certificate up by ID
    CertificateLookup { certificate_id: String },
    /// Self-describing ledger record, already verified
    LedgerCertificate(CertificateResult),
    ProductSearch(ProductQuery),
    /// Certificate data embedded in the payload itself
    EmbeddedCertificate(CertificateResult),
    /// Product data embedded in the payload itself
    EmbeddedProduct(ProductResult),
    /// Free text, identified through the label extraction path
    TextSearch { text: String },
    Unrecognized { payload: String },
}

impl ScanIntent {
    pub fn label(&self) -> &'static str {
        match self {
            ScanIntent::CertificateLookup { .. } => "certificate_lookup",
            ScanIntent::LedgerCertificate(_) => "ledger_certificate",
            ScanIntent::ProductSearch(_) => "product_search",
            ScanIntent::EmbeddedCertificate(_) => "embedded_certificate",
            ScanIntent::EmbeddedProduct(_) => "embedded_product",
            ScanIntent::TextSearch { .. } => "text_search",
            ScanIntent::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Classifies raw scan payloads. First matching rule wins.
#[derive(Debug, Clone)]
pub struct PayloadClassifier {
    prefixes: Vec<String>,
    embedded_id: Option<Regex>,
}

impl PayloadClassifier {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let prefixes: Vec<String> = config
            .certificate_prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();

        let embedded_id = if prefixes.is_empty() {
            None
        } else {
            let alternatives = prefixes
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!("(?:{})[A-Za-z0-9-]+", alternatives);
            Some(Regex::new(&pattern).map_err(|e| {
                KioskError::component("classifier", format!("invalid prefix pattern: {}", e))
            })?)
        };

        Ok(Self {
            prefixes,
            embedded_id,
        })
    }

    pub fn classify(&self, payload: &str) -> ScanIntent {
        let intent = self.classify_inner(payload.trim());
        debug!("Classified scan payload as {}", intent.label());
        intent
    }

    fn classify_inner(&self, payload: &str) -> ScanIntent {
        if payload.is_empty() {
            return ScanIntent::Unrecognized {
                payload: String::new(),
            };
        }

        if self.prefixes.iter().any(|p| payload.starts_with(p.as_str())) {
            return ScanIntent::CertificateLookup {
                certificate_id: payload.to_string(),
            };
        }

        // Only JSON objects count as structured data; arrays and scalars are
        // treated as plain text.
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(payload) {
            if let Some(fields) = Fields::of(&value) {
                return Self::classify_structured(fields);
            }
        }

        if is_url_like(payload) {
            return match self.embedded_certificate_id(payload) {
                Some(certificate_id) => ScanIntent::CertificateLookup { certificate_id },
                None => ScanIntent::Unrecognized {
                    payload: payload.to_string(),
                },
            };
        }

        ScanIntent::TextSearch {
            text: payload.to_string(),
        }
    }

    fn classify_structured(fields: Fields<'_>) -> ScanIntent {
        if parse::is_versioned_record(fields) {
            return ScanIntent::LedgerCertificate(parse::certificate_from_ledger_record(fields));
        }

        if let Some(certificate_id) = fields.text(&CERTIFICATE_ID_KEYS) {
            return ScanIntent::CertificateLookup { certificate_id };
        }

        if fields.has_any(&PRODUCT_SEARCH_KEYS) {
            let query = parse::product_query_from_payload(fields);
            if !query.is_empty() {
                return ScanIntent::ProductSearch(query);
            }
        }

        if fields.has_any(&CERTIFICATE_SHAPE_KEYS)
            || fields.text(&["type"]).as_deref() == Some("certificate")
        {
            return ScanIntent::EmbeddedCertificate(parse::certificate_from_payload(fields));
        }

        ScanIntent::EmbeddedProduct(parse::product_from_payload(fields))
    }

    pub fn embedded_certificate_id(&self, text: &str) -> Option<String> {
        self.embedded_id
            .as_ref()?
            .find(text)
            .map(|m| m.as_str().to_string())
    }
}

fn is_url_like(payload: &str) -> bool {
    let lower = payload.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
