use crate::ocr::OcrCaptureStep;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Label capture error: {0}")]
    OcrFlow(#[from] OcrFlowError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl KioskError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Camera acquisition and frame read failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("No camera could be opened (tried device indices {tried:?})")]
    NoDevice { tried: Vec<i32> },

    #[error("Failed to open camera device {index}: {details}")]
    DeviceOpen { index: i32, details: String },

    #[error("Frame read failed: {details}")]
    FrameRead { details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },
}

/// Transport-level failures talking to the verification backend.
///
/// An HTTP response that carries a JSON body is not an error here; it is handed
/// back as a [`crate::verify::BackendReply`] with `success == false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Cannot connect to verification server: {details}")]
    Connection { details: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("HTTP {status}: {details}")]
    Http { status: u16, details: String },

    #[error("Malformed response: {details}")]
    Decode { details: String },
}

impl BackendError {
    /// Short machine-readable tag, matching the `error` field the backend uses
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Connection { .. } => "connection_error",
            BackendError::Timeout { .. } => "timeout",
            BackendError::Http { .. } => "http_error",
            BackendError::Decode { .. } => "decode_error",
        }
    }
}

/// Illegal operations on the two-photo label capture flow
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcrFlowError {
    #[error("Both label photos are required before submitting (current step: {step:?})")]
    IncompletePair { step: OcrCaptureStep },

    #[error("Nothing to retake at step {step:?}")]
    NothingToRetake { step: OcrCaptureStep },

    #[error("Capture not accepted at step {step:?}")]
    CaptureRejected { step: OcrCaptureStep },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Event bus closed")]
    ChannelClosed,

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },
}

pub type Result<T> = std::result::Result<T, KioskError>;
