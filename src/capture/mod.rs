mod core;
mod debounce;
mod device;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod synthetic;
#[cfg(test)]
mod tests;
mod zbar;

pub use self::core::{CaptureControl, ScanCapture};
pub use debounce::ScanDebouncer;
pub use device::{BoundingRegion, CameraDevice, CameraOpener, DecodedSymbol, SymbolDecoder};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::{GstCamera, GstCameraOpener};
pub use synthetic::{ScanScript, ScriptedDecoder, SyntheticCamera, SyntheticCameraOpener};
pub use zbar::ZbarDecoder;
