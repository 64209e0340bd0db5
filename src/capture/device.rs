use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};

/// An opened camera. Reads block until a frame is available.
pub trait CameraDevice: Send {
    fn read_frame(&mut self) -> Result<FrameData, CameraError>;

    /// Device index this camera was opened with
    fn index(&self) -> i32;
}

/// Opens camera devices by index
pub trait CameraOpener: Send + Sync {
    fn open(&self, index: i32, config: &CameraConfig) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Axis-aligned region of a decoded symbol, in frame pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    pub payload: String,
    pub region: BoundingRegion,
}

/// QR/barcode decoding primitive
pub trait SymbolDecoder: Send {
    fn decode(&mut self, frame: &FrameData) -> Vec<DecodedSymbol>;
}
