mod machine;
mod runtime;

pub use machine::{KioskController, PROCESSING_TIMEOUT_MESSAGE};
pub use runtime::run_controller;
