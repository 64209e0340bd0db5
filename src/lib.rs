pub mod app;
pub mod capture;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod display;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod ocr;
pub mod scanlog;
pub mod state;
#[cfg(all(feature = "touch", target_os = "linux"))]
pub mod touch;
pub mod verify;

pub use app::{CameraSetup, ComponentState, KioskOrchestrator, ShutdownReason};
pub use config::KioskConfig;
pub use error::{KioskError, Result};
pub use events::{
    ControllerMessage, EventBus, EventFilter, EventReceiver, KioskEvent, OperatorCommand,
    ScanEvent, TouchSignal,
};
pub use frame::{FrameData, FrameFormat};
pub use state::{KioskState, SharedKioskState};
pub use verify::{HttpBackend, VerificationBackend, VerificationDispatcher, VerificationOutcome};
