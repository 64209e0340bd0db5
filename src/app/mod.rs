mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::KioskOrchestrator;
pub use types::{CameraSetup, ComponentState, ShutdownReason};
