//! Normalization of backend and scanned JSON into canonical result types.
//!
//! Backend responses and QR payloads come in camelCase and snake_case
//! variants, with numbers sometimes encoded as strings. Every lookup goes
//! through [`Fields`] so each alias list lives in exactly one place.

use super::backend::ProductQuery;
use super::models::{
    Approver, CertificateResult, CertificateStatus, ChainAttributes, ComplianceResult,
    ComplianceStatus, FieldCompliance, ProductResult, Provenance, SchemaVersion,
    GROUNDED_SEARCH_NOTE,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub(crate) const CERTIFICATE_ID_KEYS: [&str; 3] = ["certificateId", "certificate_id", "certId"];
pub(crate) const PRODUCT_SEARCH_KEYS: [&str; 6] = [
    "productName",
    "product_name",
    "LTONumber",
    "CFPRNumber",
    "brandName",
    "brand_name",
];
pub(crate) const CERTIFICATE_SHAPE_KEYS: [&str; 6] = [
    "certificate_id",
    "cert_id",
    "certificateId",
    "type",
    "pdfHash",
    "blockIndex",
];

/// Tag carried by ledger certificate records
pub(crate) const LEDGER_RECORD_TYPE: &str = "RCV_CERTIFICATE";

const NOT_AVAILABLE: &str = "N/A";

/// Alias-aware view over a JSON object
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a>(pub &'a Map<String, Value>);

impl<'a> Fields<'a> {
    pub fn of(value: &'a Value) -> Option<Self> {
        value.as_object().map(Fields)
    }

    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.0.contains_key(*k))
    }

    /// First non-empty string (or number rendered as a string) among `keys`
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| match self.0.get(*k)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn unsigned(&self, keys: &[&str]) -> Option<u64> {
        keys.iter().find_map(|k| match self.0.get(*k)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Finite numbers only; "NaN" and "inf" parse as floats but are not values
    pub fn float(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| {
            let value = match self.0.get(*k)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            value.filter(|f| f.is_finite())
        })
    }

    pub fn flag(&self, keys: &[&str]) -> Option<bool> {
        keys.iter().find_map(|k| match self.0.get(*k)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn object(&self, key: &str) -> Option<Fields<'a>> {
        self.0.get(key).and_then(Fields::of)
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Render a date for display as "Month DD, YYYY".
///
/// Accepts ISO timestamps (with or without fractional seconds), ISO dates and
/// `DD/MM/YYYY`. Unrecognised values fall back to their first 10 characters;
/// absent values render as "N/A".
pub fn format_display_date(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() && s != NOT_AVAILABLE => s,
        _ => return NOT_AVAILABLE.to_string(),
    };

    for fmt in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%B %d, %Y").to_string();
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.format("%B %d, %Y").to_string();
        }
    }

    raw.chars().take(10).collect()
}

fn push_unique(names: &mut Vec<String>, name: Option<String>) {
    if let Some(name) = name {
        if !names.iter().any(|n| n == &name) {
            names.push(name);
        }
    }
}

/// `certificate` object of a successful ID lookup. The ledger confirmed it.
pub fn certificate_from_lookup(
    requested_id: &str,
    record: &Value,
    document_url: Option<String>,
) -> CertificateResult {
    let empty = Map::new();
    let fields = Fields::of(record).unwrap_or(Fields(&empty));
    let mut result = certificate_from_fields(fields);
    if result.certificate_id == "Unknown" {
        result.certificate_id = requested_id.to_string();
    }
    result.status = CertificateStatus::Valid;
    result.expires_on = NOT_AVAILABLE.to_string();
    if document_url.is_some() {
        result.document_url = document_url;
    }
    result
}

/// Certificate data embedded directly in a scanned payload
pub(crate) fn certificate_from_payload(fields: Fields<'_>) -> CertificateResult {
    let mut result = certificate_from_fields(fields);
    result.status = fields
        .text(&["status"])
        .map(|s| CertificateStatus::parse(&s))
        .unwrap_or(CertificateStatus::Valid);
    result
}

fn certificate_from_fields(fields: Fields<'_>) -> CertificateResult {
    let mut entity_names = Vec::new();
    push_unique(
        &mut entity_names,
        fields.text(&["entityName", "productName", "product_name"]),
    );
    push_unique(
        &mut entity_names,
        fields.text(&["companyName", "company_name", "entityName"]),
    );

    let chain = ChainAttributes {
        block_index: fields.unsigned(&["blockIndex", "block_index", "blockNumber"]),
        block_hash: fields.text(&["blockHash", "block_hash"]),
        transaction_hash: fields.text(&["transactionHash", "txHash", "tx_hash"]),
        pdf_hash: fields.text(&["pdfHash", "pdf_hash"]),
        approvers: Vec::new(),
    };

    CertificateResult {
        certificate_id: fields
            .text(&["certificateId", "certificate_id", "cert_id", "id"])
            .unwrap_or_else(|| "Unknown".to_string()),
        entity_names,
        entity_type: fields.text(&["entityType", "entity_type"]),
        certificate_type: fields.text(&["certificateType", "certificate_type"]),
        status: CertificateStatus::Invalid,
        document_url: fields.text(&["pdfUrl", "pdf_url"]),
        issued_on: format_display_date(
            fields.text(&["issuedDate", "issue_date", "timestamp"]).as_deref(),
        ),
        expires_on: format_display_date(fields.text(&["expiryDate", "expiry_date"]).as_deref()),
        chain: (!chain.is_empty()).then_some(chain),
        version: SchemaVersion::V1,
    }
}

/// True for a ledger record declaring its schema version
pub(crate) fn is_versioned_record(fields: Fields<'_>) -> bool {
    fields.text(&["type"]).as_deref() == Some(LEDGER_RECORD_TYPE) && fields.text(&["version"]).is_some()
}

/// A self-describing ledger record. These are pre-verified: the record
/// itself is what was anchored on chain.
pub(crate) fn certificate_from_ledger_record(fields: Fields<'_>) -> CertificateResult {
    let version = fields
        .text(&["version"])
        .map(|v| SchemaVersion::parse(&v))
        .unwrap_or(SchemaVersion::V1);

    let mut entity_names = Vec::new();
    push_unique(&mut entity_names, fields.text(&["entityName"]));

    let mut approvers = Vec::new();
    if version == SchemaVersion::V2 {
        if let Some(entity) = fields.object("entity") {
            for keys in [
                &["productName", "product_name"][..],
                &["brandName", "brand_name"][..],
                &["companyName", "company_name", "name"][..],
            ] {
                push_unique(&mut entity_names, entity.text(keys));
            }
        }

        if let Some(Value::Array(items)) = fields.0.get("approvers") {
            approvers = items
                .iter()
                .filter_map(Fields::of)
                .map(|a| Approver {
                    name: a.text(&["name"]).unwrap_or_else(|| "Unknown".to_string()),
                    wallet: a.text(&["wallet"]),
                    approved_on: format_display_date(a.text(&["date"]).as_deref()),
                })
                .collect();
        }
    }

    let chain = ChainAttributes {
        block_index: fields.unsigned(&["blockIndex", "blockNumber"]),
        block_hash: fields.text(&["blockHash"]),
        transaction_hash: fields.text(&["txHash", "transactionHash"]),
        pdf_hash: fields.text(&["pdfHash"]),
        approvers,
    };

    CertificateResult {
        certificate_id: fields
            .text(&["certificateId"])
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        entity_names,
        entity_type: fields.text(&["entityType"]),
        certificate_type: fields.text(&["certificateType"]),
        status: CertificateStatus::Valid,
        document_url: fields.text(&["pdfUrl"]),
        issued_on: format_display_date(fields.text(&["timestamp", "issuedDate"]).as_deref()),
        expires_on: NOT_AVAILABLE.to_string(),
        chain: (!chain.is_empty()).then_some(chain),
        version,
    }
}

/// Document URL from a pdf lookup reply body
pub fn document_url_from_reply(body: &Value) -> Option<String> {
    let fields = Fields::of(body)?;
    fields
        .object("certificate")
        .and_then(|c| c.text(&["pdfUrl", "pdf_url"]))
        .or_else(|| fields.text(&["pdfUrl", "pdf_url"]))
}

/// Search criteria from a scanned JSON object
pub(crate) fn product_query_from_payload(fields: Fields<'_>) -> ProductQuery {
    ProductQuery {
        product_name: fields.text(&["productName", "product_name"]),
        lto_number: fields.text(&["LTONumber", "lto_number"]),
        cfpr_number: fields.text(&["CFPRNumber", "cfpr_number"]),
        brand_name: fields.text(&["brandName", "brand_name"]),
        manufacturer: fields.text(&["manufacturer"]),
    }
}

/// Search criteria extracted by the backend from label text, if it
/// identified anything at all
pub fn product_query_from_extraction(body: &Value) -> Option<ProductQuery> {
    let fields = Fields::of(body)?;
    let extracted = fields
        .object("extractedInfo")
        .or_else(|| fields.object("productInfo"))?;
    let query = ProductQuery {
        product_name: extracted.text(&["productName", "product_name"]),
        lto_number: extracted.text(&["LTONumber", "lto_number"]),
        cfpr_number: extracted.text(&["CFPRNumber", "cfpr_number"]),
        brand_name: extracted.text(&["brandName", "brand_name"]),
        manufacturer: extracted.text(&["manufacturer"]),
    };
    (!query.is_empty()).then_some(query)
}

/// First match of a successful product search, if any
pub fn product_from_search(body: &Value) -> Option<ProductResult> {
    let fields = Fields::of(body)?;
    if fields.flag(&["success"]) != Some(true) || fields.flag(&["found"]) != Some(true) {
        return None;
    }

    let hit = ["data", "Product"]
        .iter()
        .find_map(|k| fields.0.get(*k)?.as_array()?.first())
        .and_then(Fields::of)?;

    let provenance = fields
        .text(&["source"])
        .map(|s| Provenance::parse(&s))
        .unwrap_or(Provenance::InternalDatabase);
    let company = hit.object("company").and_then(|c| c.text(&["name"]));

    let mut warnings = Vec::new();
    if provenance == Provenance::GroundedSearchPdf {
        warnings.push(GROUNDED_SEARCH_NOTE.to_string());
    }

    Some(ProductResult {
        product_name: hit
            .text(&["productName"])
            .unwrap_or_else(|| "Unknown".to_string()),
        brand_name: hit
            .text(&["brandName"])
            .or_else(|| company.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        manufacturer: company,
        batch_number: hit
            .text(&["batchNumber"])
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        lto_number: hit.text(&["LTONumber"]),
        cfpr_number: hit.text(&["CFPRNumber"]),
        registered_on: format_display_date(hit.text(&["dateOfRegistration"]).as_deref()),
        expires_on: format_display_date(hit.text(&["expirationDate"]).as_deref()),
        is_authentic: true,
        confidence: hit.float(&["confidence"]).unwrap_or(0.95).clamp(0.0, 1.0),
        provenance,
        warnings,
    })
}

/// Product data carried directly in a scanned payload
pub(crate) fn product_from_payload(fields: Fields<'_>) -> ProductResult {
    ProductResult {
        product_name: fields
            .text(&["productName", "product_name"])
            .unwrap_or_else(|| "Unknown".to_string()),
        brand_name: fields
            .text(&["brandName", "brand", "manufacturer"])
            .unwrap_or_else(|| "Unknown".to_string()),
        manufacturer: fields.text(&["manufacturer"]),
        batch_number: fields
            .text(&["batchNumber", "batch_number"])
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        lto_number: fields.text(&["LTONumber"]),
        cfpr_number: fields.text(&["CFPRNumber"]),
        registered_on: format_display_date(
            fields
                .text(&["dateOfRegistration", "manufacture_date"])
                .as_deref(),
        ),
        expires_on: format_display_date(
            fields.text(&["expirationDate", "expiry_date"]).as_deref(),
        ),
        is_authentic: fields.flag(&["isAuthentic", "verified"]).unwrap_or(true),
        confidence: fields
            .float(&["confidence", "score"])
            .unwrap_or(0.85)
            .clamp(0.0, 1.0),
        provenance: fields
            .text(&["source"])
            .map(|s| Provenance::parse(&s))
            .unwrap_or(Provenance::QrCode),
        warnings: fields.strings("warnings"),
    }
}

fn field_compliance(fields: Option<Fields<'_>>) -> FieldCompliance {
    let Some(fields) = fields else {
        return FieldCompliance::unknown();
    };

    // foundOnPackaging is a flag for registration numbers and the detected
    // value (or null) for the expiration date
    let (found_on_packaging, detected) = match fields.0.get("foundOnPackaging") {
        Some(Value::Bool(b)) => (*b, None),
        Some(Value::String(s)) if !s.is_empty() => (true, Some(s.clone())),
        _ => (false, None),
    };

    FieldCompliance {
        required: fields.text(&["required"]),
        found_on_packaging,
        detected,
        status: fields
            .text(&["status"])
            .map(|s| ComplianceStatus::parse(&s))
            .unwrap_or(ComplianceStatus::Unknown),
    }
}

/// Compliance report of a label scan. `None` when the body is not a
/// compliance report for an identified product.
pub fn compliance_from_scan(body: &Value) -> Option<ComplianceResult> {
    let fields = Fields::of(body)?;
    if fields.flag(&["found"]) != Some(true) {
        return None;
    }
    let packaging = fields.object("packagingCompliance");
    let info = fields.object("productInfo");

    let violations = fields.strings("violations");
    let is_compliant = fields
        .flag(&["isCompliant"])
        .unwrap_or(violations.is_empty());

    Some(ComplianceResult {
        product_name: info
            .and_then(|i| i.text(&["productName", "product_name"]))
            .unwrap_or_else(|| "Unknown".to_string()),
        brand_name: info.and_then(|i| i.text(&["brandName", "brand_name"])),
        manufacturer: info.and_then(|i| i.text(&["manufacturer"])),
        is_compliant,
        message: fields.text(&["message"]).unwrap_or_default(),
        cfpr: field_compliance(packaging.and_then(|p| p.object("cfpr"))),
        lto: field_compliance(packaging.and_then(|p| p.object("lto"))),
        expiration_date: field_compliance(packaging.and_then(|p| p.object("expirationDate"))),
        violations,
        warnings: fields.strings("warnings"),
    })
}

/// Human-readable message of a failed reply
pub fn reply_message(body: &Value) -> Option<String> {
    Fields::of(body).and_then(|f| f.text(&["message", "error"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_display_date_variants() {
        assert_eq!(
            format_display_date(Some("2024-03-05T10:11:12.345Z")),
            "March 05, 2024"
        );
        assert_eq!(
            format_display_date(Some("2024-03-05T10:11:12Z")),
            "March 05, 2024"
        );
        assert_eq!(format_display_date(Some("2023-12-31")), "December 31, 2023");
        assert_eq!(format_display_date(Some("01/02/2025")), "February 01, 2025");
        assert_eq!(format_display_date(Some("sometime in 2024")), "sometime i");
        assert_eq!(format_display_date(None), "N/A");
        assert_eq!(format_display_date(Some("N/A")), "N/A");
        assert_eq!(format_display_date(Some("  ")), "N/A");
    }

    #[test]
    fn test_fields_aliases_and_coercion() {
        let value = json!({"certId": 42, "blockIndex": "17", "isAuthentic": "false", "name": ""});
        let fields = Fields::of(&value).unwrap();
        assert_eq!(fields.text(&["certificateId", "certId"]).as_deref(), Some("42"));
        assert_eq!(fields.unsigned(&["blockIndex"]), Some(17));
        assert_eq!(fields.flag(&["isAuthentic"]), Some(false));
        assert_eq!(fields.text(&["name"]), None);
    }

    #[test]
    fn test_float_rejects_non_finite() {
        let value = json!({"confidence": "NaN", "score": "0.4", "big": "inf", "plain": 0.7});
        let fields = Fields::of(&value).unwrap();
        assert_eq!(fields.float(&["confidence"]), None);
        assert_eq!(fields.float(&["big"]), None);
        assert_eq!(fields.float(&["confidence", "score"]), Some(0.4));
        assert_eq!(fields.float(&["plain"]), Some(0.7));

        let product = product_from_payload(Fields::of(&json!({"item": "x", "confidence": "NaN"})).unwrap());
        assert_eq!(product.confidence, 0.85);
    }

    #[test]
    fn test_certificate_from_lookup() {
        let record = json!({
            "certificateId": "CERT-COMP-001",
            "entityName": "Acme Foods Inc.",
            "issuedDate": "2024-01-15T08:00:00.000Z",
            "certificateType": "company",
            "blockIndex": 12,
            "blockHash": "0xabc",
            "pdfHash": "deadbeef"
        });
        let cert = certificate_from_lookup(
            "CERT-COMP-001",
            &record,
            Some("https://files.example/cert.pdf".to_string()),
        );

        assert_eq!(cert.status, CertificateStatus::Valid);
        assert_eq!(cert.primary_name(), "Acme Foods Inc.");
        assert_eq!(cert.issued_on, "January 15, 2024");
        assert_eq!(cert.expires_on, "N/A");
        assert_eq!(cert.document_url.as_deref(), Some("https://files.example/cert.pdf"));
        let chain = cert.chain.unwrap();
        assert_eq!(chain.block_index, Some(12));
        assert_eq!(chain.pdf_hash.as_deref(), Some("deadbeef"));
        assert_eq!(cert.version, SchemaVersion::V1);
    }

    #[test]
    fn test_lookup_without_id_keeps_requested_id() {
        let cert = certificate_from_lookup("CERT-PROD-9", &json!({}), None);
        assert_eq!(cert.certificate_id, "CERT-PROD-9");
        assert!(cert.chain.is_none());
    }

    #[test]
    fn test_v2_ledger_record_parses_entity_and_approvers() {
        let record = json!({
            "type": "RCV_CERTIFICATE",
            "version": "2.0",
            "certificateId": "CERT-PROD-77",
            "entityType": "product",
            "entityName": "Herbal Tea",
            "pdfHash": "cafe",
            "timestamp": "2024-06-01T00:00:00Z",
            "entity": {"productName": "Herbal Tea", "brandName": "Leafy", "companyName": "Leafy Co"},
            "approvers": [
                {"wallet": "0x1", "name": "Inspector A", "date": "2024-05-30"},
                {"wallet": "0x2", "name": "Inspector B", "date": "2024-05-31T12:00:00Z"}
            ]
        });
        let cert = certificate_from_ledger_record(Fields::of(&record).unwrap());

        assert_eq!(cert.version, SchemaVersion::V2);
        assert_eq!(cert.status, CertificateStatus::Valid);
        assert_eq!(cert.entity_names, vec!["Herbal Tea", "Leafy", "Leafy Co"]);
        let chain = cert.chain.unwrap();
        assert_eq!(chain.approvers.len(), 2);
        assert_eq!(chain.approvers[0].approved_on, "May 30, 2024");
        assert_eq!(chain.approvers[1].wallet.as_deref(), Some("0x2"));
    }

    #[test]
    fn test_v1_ledger_record_ignores_v2_fields() {
        let record = json!({
            "type": "RCV_CERTIFICATE",
            "version": "1.0",
            "certificateId": "CERT-COMP-5",
            "entityName": "Acme",
            "approvers": [{"name": "ignored"}]
        });
        let cert = certificate_from_ledger_record(Fields::of(&record).unwrap());
        assert_eq!(cert.version, SchemaVersion::V1);
        assert!(cert.chain.is_none());
        assert_eq!(cert.entity_names, vec!["Acme"]);
    }

    #[test]
    fn test_product_from_search_grounded() {
        let body = json!({
            "success": true,
            "found": true,
            "source": "grounded_search_pdf",
            "Product": [{
                "productName": "Vitamin C",
                "company": {"name": "Pharma Corp"},
                "LTONumber": "LTO-1",
                "expirationDate": "2026-01-01"
            }]
        });
        let product = product_from_search(&body).unwrap();
        assert_eq!(product.brand_name, "Pharma Corp");
        assert_eq!(product.provenance, Provenance::GroundedSearchPdf);
        assert_eq!(product.warnings, vec![GROUNDED_SEARCH_NOTE.to_string()]);
        assert_eq!(product.confidence, 0.95);
        assert_eq!(product.expires_on, "January 01, 2026");
    }

    #[test]
    fn test_product_from_search_empty_hits() {
        let body = json!({"success": true, "found": true, "data": []});
        assert!(product_from_search(&body).is_none());
        assert!(product_from_search(&json!({"success": true, "found": false})).is_none());
    }

    #[test]
    fn test_product_from_payload_defaults() {
        let value = json!({"item": "mystery"});
        let product = product_from_payload(Fields::of(&value).unwrap());
        assert_eq!(product.provenance, Provenance::QrCode);
        assert!(product.is_authentic);
        assert_eq!(product.confidence, 0.85);
        assert_eq!(product.product_name, "Unknown");
    }

    #[test]
    fn test_compliance_from_scan() {
        let body = json!({
            "success": true,
            "found": true,
            "isCompliant": false,
            "message": "Product identified - Packaging has violations",
            "productInfo": {"productName": "Soy Sauce", "brandName": null, "manufacturer": "Umami"},
            "packagingCompliance": {
                "cfpr": {"required": "FR-123", "foundOnPackaging": true, "status": "COMPLIANT"},
                "lto": {"required": null, "foundOnPackaging": false, "status": "NOT_REGISTERED"},
                "expirationDate": {"foundOnPackaging": null, "status": "VIOLATION"}
            },
            "violations": ["WARNING: Expiration date NOT found on packaging"],
            "warnings": ["Product has NO LTO in database"]
        });
        let report = compliance_from_scan(&body).unwrap();

        assert_eq!(report.product_name, "Soy Sauce");
        assert_eq!(report.brand_name, None);
        assert!(!report.is_compliant);
        assert_eq!(report.cfpr.status, ComplianceStatus::Compliant);
        assert!(report.cfpr.found_on_packaging);
        assert_eq!(report.lto.status, ComplianceStatus::Unknown);
        assert_eq!(report.expiration_date.status, ComplianceStatus::Violation);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_compliance_detected_expiration_value() {
        let body = json!({
            "found": true,
            "packagingCompliance": {
                "expirationDate": {"foundOnPackaging": "EXP 12/2026", "status": "COMPLIANT"}
            }
        });
        let report = compliance_from_scan(&body).unwrap();
        assert!(report.is_compliant);
        assert_eq!(report.expiration_date.detected.as_deref(), Some("EXP 12/2026"));
        assert_eq!(report.cfpr, FieldCompliance::unknown());
    }

    #[test]
    fn test_product_query_from_extraction() {
        let body = json!({"success": true, "extractedInfo": {"productName": "Tea", "CFPRNumber": "FR-1"}});
        let query = product_query_from_extraction(&body).unwrap();
        assert_eq!(query.product_name.as_deref(), Some("Tea"));
        assert_eq!(query.cfpr_number.as_deref(), Some("FR-1"));

        assert!(product_query_from_extraction(&json!({"success": true, "extractedInfo": {}})).is_none());
    }

    #[test]
    fn test_document_url_from_reply() {
        let body = json!({"success": true, "certificate": {"pdfUrl": "https://x/y.pdf"}});
        assert_eq!(document_url_from_reply(&body).as_deref(), Some("https://x/y.pdf"));
        assert_eq!(document_url_from_reply(&json!({"success": false})), None);
    }
}
