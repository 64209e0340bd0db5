use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Top-level kiosk state. Exactly one is active at a time and only the
/// controller changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KioskState {
    CameraOff,
    /// Camera running and scans accepted
    Idle,
    OcrCapture,
    Processing,
    DisplayCertificate,
    DisplayProduct,
    DisplayCompliance,
    Error,
    Maintenance,
}

impl KioskState {
    pub const ALL: [KioskState; 9] = [
        KioskState::CameraOff,
        KioskState::Idle,
        KioskState::OcrCapture,
        KioskState::Processing,
        KioskState::DisplayCertificate,
        KioskState::DisplayProduct,
        KioskState::DisplayCompliance,
        KioskState::Error,
        KioskState::Maintenance,
    ];

    /// Result screens that auto-return to Idle after the result duration
    pub fn is_display(&self) -> bool {
        matches!(
            self,
            KioskState::DisplayCertificate
                | KioskState::DisplayProduct
                | KioskState::DisplayCompliance
        )
    }

    /// Scans from the capture loop are only evaluated while Idle
    pub fn accepts_scans(&self) -> bool {
        matches!(self, KioskState::Idle)
    }

    /// Status line shown by the presenter
    pub fn status_text(&self) -> &'static str {
        match self {
            KioskState::CameraOff => "Camera off",
            KioskState::Idle => "Ready to Scan",
            KioskState::OcrCapture => "Label scan",
            KioskState::Processing => "Processing scan...",
            KioskState::DisplayCertificate => "Certificate result",
            KioskState::DisplayProduct => "Product result",
            KioskState::DisplayCompliance => "Compliance result",
            KioskState::Error => "Error",
            KioskState::Maintenance => "Under maintenance, reconnecting...",
        }
    }
}

impl fmt::Display for KioskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Read handle on the current kiosk state, shared with the capture thread.
///
/// Cloning is cheap. Only [`crate::controller::KioskController`] writes
/// through it; the capture loop polls it to decide whether decoded payloads
/// should be forwarded at all.
#[derive(Debug, Clone)]
pub struct SharedKioskState {
    inner: Arc<RwLock<KioskState>>,
}

impl SharedKioskState {
    pub fn new(initial: KioskState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> KioskState {
        *self.inner.read()
    }

    pub(crate) fn set(&self, state: KioskState) {
        *self.inner.write() = state;
    }
}

impl Default for SharedKioskState {
    fn default() -> Self {
        Self::new(KioskState::CameraOff)
    }
}
