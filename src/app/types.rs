use crate::capture::{CameraOpener, SymbolDecoder};
use std::fmt;
use std::sync::Arc;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {}", name),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
            ShutdownReason::UserRequest => write!(f, "operator request"),
        }
    }
}

/// Camera source and QR decoder handed to the capture loop
pub struct CameraSetup {
    pub opener: Arc<dyn CameraOpener>,
    pub decoder: Box<dyn SymbolDecoder>,
}
