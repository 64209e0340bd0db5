use super::device::{BoundingRegion, CameraDevice, CameraOpener, DecodedSymbol, SymbolDecoder};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

/// Opens [`SyntheticCamera`]s for the configured indices. Used for dry runs
/// and tests where no camera hardware is present.
#[derive(Debug, Clone)]
pub struct SyntheticCameraOpener {
    /// Indices that open successfully; `None` accepts every index
    available: Option<Vec<i32>>,
    /// Every Nth read fails, to exercise the transient error path
    fail_every: Option<u64>,
}

impl SyntheticCameraOpener {
    pub fn new() -> Self {
        Self {
            available: None,
            fail_every: None,
        }
    }

    pub fn with_devices(available: Vec<i32>) -> Self {
        Self {
            available: Some(available),
            fail_every: None,
        }
    }

    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }
}

impl Default for SyntheticCameraOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraOpener for SyntheticCameraOpener {
    fn open(&self, index: i32, config: &CameraConfig) -> Result<Box<dyn CameraDevice>, CameraError> {
        if let Some(available) = &self.available {
            if !available.contains(&index) {
                return Err(CameraError::DeviceOpen {
                    index,
                    details: "no such synthetic device".to_string(),
                });
            }
        }
        debug!("Opening synthetic camera {}", index);
        Ok(Box::new(SyntheticCamera {
            index,
            resolution: config.resolution,
            reads: 0,
            fail_every: self.fail_every,
        }))
    }
}

/// Generates small MJPEG-shaped frames
#[derive(Debug)]
pub struct SyntheticCamera {
    index: i32,
    resolution: (u32, u32),
    reads: u64,
    fail_every: Option<u64>,
}

impl CameraDevice for SyntheticCamera {
    fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        self.reads += 1;
        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(CameraError::FrameRead {
                    details: format!("synthetic read failure #{}", self.reads),
                });
            }
        }

        let frame_id = self.reads;
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];
        let pattern_size = 256 + (frame_id % 128) as usize;
        data.extend(std::iter::repeat((frame_id % 256) as u8).take(pattern_size));
        data.extend_from_slice(&[0xFF, 0xD9]);

        trace!("Generated synthetic frame {} ({} bytes)", frame_id, data.len());
        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.resolution.0,
            self.resolution.1,
            FrameFormat::Mjpeg,
        ))
    }

    fn index(&self) -> i32 {
        self.index
    }
}

/// Cloneable handle for presenting payloads to a [`ScriptedDecoder`]
#[derive(Debug, Clone, Default)]
pub struct ScanScript {
    queue: Arc<Mutex<VecDeque<(String, u32)>>>,
}

impl ScanScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `payload` visible for the next `frames` decoded frames, as if a
    /// code were held in front of the camera
    pub fn show<S: Into<String>>(&self, payload: S, frames: u32) {
        self.queue.lock().push_back((payload.into(), frames.max(1)));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Decoder that reports whatever its [`ScanScript`] presents
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    script: ScanScript,
}

impl ScriptedDecoder {
    pub fn new(script: ScanScript) -> Self {
        Self { script }
    }
}

impl SymbolDecoder for ScriptedDecoder {
    fn decode(&mut self, frame: &FrameData) -> Vec<DecodedSymbol> {
        let mut queue = self.script.queue.lock();
        let Some((payload, remaining)) = queue.front_mut() else {
            return Vec::new();
        };

        let symbol = DecodedSymbol {
            payload: payload.clone(),
            region: BoundingRegion {
                x: frame.width / 4,
                y: frame.height / 4,
                width: frame.width / 2,
                height: frame.height / 2,
            },
        };
        *remaining -= 1;
        if *remaining == 0 {
            queue.pop_front();
        }
        vec![symbol]
    }
}
