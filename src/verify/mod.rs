//! Payload classification and verification against the remote service.

mod backend;
mod classify;
mod dispatcher;
mod http;
#[cfg(test)]
pub(crate) mod mock;
mod models;
mod parse;

pub use backend::{BackendReply, OcrScanRequest, ProductQuery, VerificationBackend};
pub use classify::{PayloadClassifier, ScanIntent};
pub use dispatcher::VerificationDispatcher;
pub use http::HttpBackend;
pub use parse::format_display_date;
pub use models::{
    Approver, CertificateResult, CertificateStatus, ChainAttributes, ComplianceResult,
    ComplianceStatus, FieldCompliance, ProductResult, Provenance, SchemaVersion,
    VerificationFailure, VerificationOutcome, GROUNDED_SEARCH_NOTE, NOT_FOUND_WARNINGS,
};
