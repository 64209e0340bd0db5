use crate::error::EventBusError;
use crate::events::{EventBus, EventFilter, EventReceiver, KioskEvent};
use crate::ocr::OcrCaptureStep;
use crate::state::KioskState;
use crate::verify::{
    CertificateResult, CertificateStatus, ComplianceResult, ComplianceStatus, FieldCompliance,
    ProductResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Text-mode display collaborator.
///
/// Renders the kiosk screens as log lines. Preview frames are skipped; a
/// graphical front end would subscribe to those separately.
pub struct DisplayPresenter {
    receiver: EventReceiver,
    last_status: Option<String>,
}

impl DisplayPresenter {
    pub fn new(event_bus: &EventBus) -> Self {
        let filter = EventFilter::Custom(|event| {
            !matches!(
                event,
                KioskEvent::PreviewFrame { .. } | KioskEvent::ScanAccepted { .. }
            )
        });
        Self {
            receiver: EventReceiver::new(event_bus.subscribe(), filter, "display-presenter"),
            last_status: None,
        }
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Display presenter started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.receiver.recv() => event,
            };

            match event {
                Ok(event) => self.present(&event),
                Err(EventBusError::Lagged { skipped }) => {
                    warn!("Display presenter skipped {} events", skipped);
                }
                Err(EventBusError::ChannelClosed) => break,
            }
        }
        info!("Display presenter stopped");
    }

    /// Render one event, remembering the first line as the current status
    pub fn present(&mut self, event: &KioskEvent) {
        let Some(lines) = render(event) else {
            debug!("Presenter ignoring {}", event.event_type());
            return;
        };
        for line in &lines {
            info!(target: "verikiosk::screen", "{}", line);
        }
        self.last_status = lines.into_iter().next();
    }
}

/// Screen text for an event, or None for events with no visible effect
pub fn render(event: &KioskEvent) -> Option<Vec<String>> {
    let lines = match event {
        KioskEvent::StateChanged { to, .. } => match to {
            KioskState::OcrCapture => vec![OcrCaptureStep::ReadyFront.prompt().to_string()],
            // Result and error screens are rendered from their own events
            s if s.is_display() || *s == KioskState::Error => return None,
            s => vec![s.status_text().to_string()],
        },
        KioskEvent::CertificateReady { result } => certificate_lines(result),
        KioskEvent::ProductReady { result } => product_lines(result),
        KioskEvent::ComplianceReady { result } => compliance_lines(result),
        KioskEvent::ErrorShown { message, persistent } => {
            let mut lines = vec![format!("Error: {}", message)];
            if *persistent {
                lines.push("Please contact staff.".to_string());
            }
            lines
        }
        KioskEvent::CountdownTick { remaining_seconds } => {
            vec![format!("Next scan in: {}s", remaining_seconds)]
        }
        KioskEvent::CountdownPaused { remaining_seconds } => {
            vec![format!("Paused ({}s left)", remaining_seconds)]
        }
        KioskEvent::CountdownResumed { remaining_seconds } => {
            vec![format!("Next scan in: {}s", remaining_seconds)]
        }
        KioskEvent::OcrStepChanged { step } => vec![step.prompt().to_string()],
        KioskEvent::MaintenanceEntered { .. } => vec![
            "System under maintenance".to_string(),
            "Waiting for connection to the verification service...".to_string(),
        ],
        KioskEvent::MaintenanceExited { .. } => vec!["Connection restored".to_string()],
        KioskEvent::ShutdownRequested { .. } => vec!["Shutting down".to_string()],
        KioskEvent::ConnectivityChanged { .. }
        | KioskEvent::ScanAccepted { .. }
        | KioskEvent::PreviewFrame { .. } => return None,
    };
    Some(lines)
}

fn certificate_lines(result: &CertificateResult) -> Vec<String> {
    let headline = match result.status {
        CertificateStatus::Valid => "VERIFIED CERTIFICATE",
        CertificateStatus::Pending => "CERTIFICATE PENDING VERIFICATION",
        CertificateStatus::Invalid => "CERTIFICATE NOT VERIFIED",
    };
    let mut lines = vec![
        headline.to_string(),
        format!("Certificate: {}", result.certificate_id),
        format!("Issued to: {}", result.primary_name()),
        format!("Issued: {}", result.issued_on),
        format!("Expires: {}", result.expires_on),
    ];
    if let Some(kind) = &result.certificate_type {
        lines.push(format!("Type: {}", kind));
    }
    if let Some(chain) = &result.chain {
        if let Some(block) = chain.block_index {
            lines.push(format!("Block: #{}", block));
        }
        for approver in &chain.approvers {
            lines.push(format!("Approved by {} on {}", approver.name, approver.approved_on));
        }
    }
    if let Some(url) = &result.document_url {
        lines.push(format!("Document: {}", url));
    }
    lines
}

fn product_lines(result: &ProductResult) -> Vec<String> {
    let headline = if result.is_authentic {
        "AUTHENTIC PRODUCT"
    } else {
        "PRODUCT NOT VERIFIED"
    };
    let mut lines = vec![
        headline.to_string(),
        format!("Product: {}", result.product_name),
        format!("Brand: {}", result.brand_name),
        format!("Confidence: {:.0}%", result.confidence * 100.0),
    ];
    if let Some(lto) = &result.lto_number {
        lines.push(format!("LTO: {}", lto));
    }
    if let Some(cfpr) = &result.cfpr_number {
        lines.push(format!("CFPR: {}", cfpr));
    }
    lines.push(format!("Expires: {}", result.expires_on));
    lines.extend(result.warnings.iter().map(|w| format!("! {}", w)));
    lines
}

fn compliance_lines(result: &ComplianceResult) -> Vec<String> {
    let headline = if result.is_compliant {
        "LABEL COMPLIANT"
    } else {
        "COMPLIANCE ISSUES FOUND"
    };
    let mut lines = vec![
        headline.to_string(),
        format!("Product: {}", result.product_name),
        field_line("CFPR", &result.cfpr),
        field_line("LTO", &result.lto),
        field_line("Expiration", &result.expiration_date),
    ];
    if !result.message.is_empty() {
        lines.push(result.message.clone());
    }
    lines.extend(result.violations.iter().map(|v| format!("x {}", v)));
    lines.extend(result.warnings.iter().map(|w| format!("! {}", w)));
    lines
}

fn field_line(label: &str, field: &FieldCompliance) -> String {
    let status = match field.status {
        ComplianceStatus::Compliant => "OK",
        ComplianceStatus::Violation => "VIOLATION",
        ComplianceStatus::Unknown => "UNKNOWN",
    };
    match &field.detected {
        Some(detected) => format!("{}: {} ({})", label, status, detected),
        None => format!("{}: {}", label, status),
    }
}
