use crate::error::EventBusError;
use crate::frame::FrameData;
use crate::ocr::OcrCaptureStep;
use crate::state::KioskState;
use crate::verify::{CertificateResult, ComplianceResult, ProductResult, VerificationOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Notifications for display, speech and logging collaborators
#[derive(Debug, Clone)]
pub enum KioskEvent {
    StateChanged {
        from: KioskState,
        to: KioskState,
        timestamp: SystemTime,
    },
    /// A scan was accepted and verification dispatched
    ScanAccepted {
        source: ScanSource,
        generation: u64,
        timestamp: SystemTime,
    },
    CertificateReady { result: Arc<CertificateResult> },
    ProductReady { result: Arc<ProductResult> },
    ComplianceReady { result: Arc<ComplianceResult> },
    /// Error screen. Persistent errors have no auto-return.
    ErrorShown { message: String, persistent: bool },
    CountdownTick { remaining_seconds: u32 },
    CountdownPaused { remaining_seconds: u32 },
    CountdownResumed { remaining_seconds: u32 },
    OcrStepChanged { step: OcrCaptureStep },
    /// Every Nth camera frame, regardless of decode outcome
    PreviewFrame { frame: FrameData },
    MaintenanceEntered {
        consecutive_failures: u32,
        timestamp: SystemTime,
    },
    MaintenanceExited { timestamp: SystemTime },
    ConnectivityChanged {
        online: bool,
        consecutive_failures: u32,
    },
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl KioskEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            KioskEvent::StateChanged { timestamp, .. } => *timestamp,
            KioskEvent::ScanAccepted { timestamp, .. } => *timestamp,
            KioskEvent::PreviewFrame { frame } => frame.timestamp,
            KioskEvent::MaintenanceEntered { timestamp, .. } => *timestamp,
            KioskEvent::MaintenanceExited { timestamp } => *timestamp,
            KioskEvent::ShutdownRequested { timestamp, .. } => *timestamp,
            _ => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            KioskEvent::StateChanged { from, to, .. } => format!("State {} -> {}", from, to),
            KioskEvent::ScanAccepted {
                source, generation, ..
            } => format!("Scan accepted from {} (generation {})", source, generation),
            KioskEvent::CertificateReady { result } => format!(
                "Certificate {} for {}: {}",
                result.certificate_id,
                result.primary_name(),
                result.status
            ),
            KioskEvent::ProductReady { result } => format!(
                "Product {} (authentic: {}, confidence {:.2})",
                result.product_name, result.is_authentic, result.confidence
            ),
            KioskEvent::ComplianceReady { result } => format!(
                "Compliance for {}: {}",
                result.product_name,
                if result.is_compliant {
                    "compliant"
                } else {
                    "violations found"
                }
            ),
            KioskEvent::ErrorShown { message, persistent } => {
                if *persistent {
                    format!("Persistent error: {}", message)
                } else {
                    format!("Error: {}", message)
                }
            }
            KioskEvent::CountdownTick { remaining_seconds } => {
                format!("Next scan in: {}s", remaining_seconds)
            }
            KioskEvent::CountdownPaused { remaining_seconds } => {
                format!("Countdown paused at {}", remaining_seconds)
            }
            KioskEvent::CountdownResumed { remaining_seconds } => {
                format!("Countdown resumed at {}", remaining_seconds)
            }
            KioskEvent::OcrStepChanged { step } => format!("Label capture: {:?}", step),
            KioskEvent::PreviewFrame { frame } => format!("Preview frame {}", frame.id),
            KioskEvent::MaintenanceEntered {
                consecutive_failures,
                ..
            } => format!(
                "Maintenance mode after {} failed health checks",
                consecutive_failures
            ),
            KioskEvent::MaintenanceExited { .. } => "Connection restored".to_string(),
            KioskEvent::ConnectivityChanged {
                online,
                consecutive_failures,
            } => format!(
                "Backend {} ({} consecutive failures)",
                if *online { "online" } else { "offline" },
                consecutive_failures
            ),
            KioskEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            KioskEvent::StateChanged { .. } => "state_changed",
            KioskEvent::ScanAccepted { .. } => "scan_accepted",
            KioskEvent::CertificateReady { .. } => "certificate_ready",
            KioskEvent::ProductReady { .. } => "product_ready",
            KioskEvent::ComplianceReady { .. } => "compliance_ready",
            KioskEvent::ErrorShown { .. } => "error_shown",
            KioskEvent::CountdownTick { .. } => "countdown_tick",
            KioskEvent::CountdownPaused { .. } => "countdown_paused",
            KioskEvent::CountdownResumed { .. } => "countdown_resumed",
            KioskEvent::OcrStepChanged { .. } => "ocr_step_changed",
            KioskEvent::PreviewFrame { .. } => "preview_frame",
            KioskEvent::MaintenanceEntered { .. } => "maintenance_entered",
            KioskEvent::MaintenanceExited { .. } => "maintenance_exited",
            KioskEvent::ConnectivityChanged { .. } => "connectivity_changed",
            KioskEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus for kiosk notifications.
///
/// Publishing is synchronous so the capture thread can hand over preview
/// frames without a runtime handle.
pub struct EventBus {
    sender: broadcast::Sender<KioskEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    /// Nobody listening is not an error.
    pub fn publish(&self, event: KioskEvent) -> usize {
        match &event {
            KioskEvent::StateChanged { from, to, .. } => {
                info!("Kiosk state: {} -> {}", from, to);
            }
            KioskEvent::ErrorShown {
                message,
                persistent: true,
            } => {
                error!("Persistent error shown: {}", message);
            }
            KioskEvent::MaintenanceEntered {
                consecutive_failures,
                ..
            } => {
                warn!(
                    "Entering maintenance mode after {} failed health checks",
                    consecutive_failures
                );
            }
            KioskEvent::MaintenanceExited { .. } => {
                info!("Backend reachable again, leaving maintenance mode");
            }
            KioskEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            KioskEvent::PreviewFrame { .. } | KioskEvent::CountdownTick { .. } => {}
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    /// Everything except high-rate frame and countdown traffic
    Significant,
    Custom(fn(&KioskEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &KioskEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Significant => !matches!(
                event,
                KioskEvent::PreviewFrame { .. } | KioskEvent::CountdownTick { .. }
            ),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Named, filtered subscription to the event bus
pub struct EventReceiver {
    receiver: broadcast::Receiver<KioskEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<KioskEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<KioskEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<KioskEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Where a scan payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Qr,
    Ocr,
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanSource::Qr => write!(f, "qr"),
            ScanSource::Ocr => write!(f, "ocr"),
        }
    }
}

/// A debounced payload from the capture loop
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub payload: String,
    pub captured_at: SystemTime,
    pub source: ScanSource,
}

impl ScanEvent {
    pub fn qr<S: Into<String>>(payload: S) -> Self {
        Self {
            payload: payload.into(),
            captured_at: SystemTime::now(),
            source: ScanSource::Qr,
        }
    }
}

/// Operator actions from keyboard or touch screen buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    StartScanning,
    StartLabelScan,
    Capture,
    Retake,
    Submit,
    Cancel,
}

impl OperatorCommand {
    pub const ALL: [OperatorCommand; 6] = [
        OperatorCommand::StartScanning,
        OperatorCommand::StartLabelScan,
        OperatorCommand::Capture,
        OperatorCommand::Retake,
        OperatorCommand::Submit,
        OperatorCommand::Cancel,
    ];
}

/// Sustained touch on the screen pauses the result countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchSignal {
    Pressed,
    Released,
}

/// Everything the controller reacts to, delivered through one queue
#[derive(Debug, Clone)]
pub enum ControllerMessage {
    Operator(OperatorCommand),
    Scan(ScanEvent),
    VerificationCompleted {
        generation: u64,
        outcome: VerificationOutcome,
    },
    ProbeCompleted { healthy: bool },
    Tick,
    Touch(TouchSignal),
    Shutdown,
}

impl ControllerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerMessage::Operator(_) => "operator",
            ControllerMessage::Scan(_) => "scan",
            ControllerMessage::VerificationCompleted { .. } => "verification_completed",
            ControllerMessage::ProbeCompleted { .. } => "probe_completed",
            ControllerMessage::Tick => "tick",
            ControllerMessage::Touch(_) => "touch",
            ControllerMessage::Shutdown => "shutdown",
        }
    }
}
