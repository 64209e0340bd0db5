use super::device::{CameraDevice, CameraOpener};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// Reads block at most this long so the capture loop can observe stop requests
const PULL_TIMEOUT_MS: u64 = 500;

/// Opens V4L2 cameras through a GStreamer MJPEG pipeline
#[derive(Debug, Default, Clone)]
pub struct GstCameraOpener;

impl GstCameraOpener {
    pub fn new() -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self)
    }

    fn pipeline_description(index: i32, config: &CameraConfig) -> String {
        let (width, height) = config.resolution;
        // -1 lets v4l2src pick its default device
        let source = if index < 0 {
            "v4l2src io-mode=mmap do-timestamp=true".to_string()
        } else {
            format!("v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true", index)
        };

        format!(
            "{} ! image/jpeg,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=2 drop=true emit-signals=false",
            source, width, height, config.fps
        )
    }
}

impl CameraOpener for GstCameraOpener {
    fn open(&self, index: i32, config: &CameraConfig) -> Result<Box<dyn CameraDevice>, CameraError> {
        let description = Self::pipeline_description(index, config);
        debug!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CameraError::DeviceOpen {
                index,
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::DeviceOpen {
                index,
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let sink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::DeviceOpen {
                index,
                details: "Pipeline has no appsink".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceOpen {
                index,
                details: format!("Failed to start pipeline: {}", e),
            })?;

        // v4l2src only fails once it actually negotiates with the device
        let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(2));
        if result.is_err() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::DeviceOpen {
                index,
                details: "Pipeline failed to reach PLAYING".to_string(),
            });
        }

        info!("GStreamer camera {} is playing", index);
        Ok(Box::new(GstCamera {
            index,
            pipeline,
            sink,
            frames: 0,
        }))
    }
}

pub struct GstCamera {
    index: i32,
    pipeline: Pipeline,
    sink: AppSink,
    frames: u64,
}

impl CameraDevice for GstCamera {
    fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        let sample = self
            .sink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
            .ok_or_else(|| CameraError::FrameRead {
                details: "No sample available".to_string(),
            })?;

        let buffer = sample.buffer().ok_or_else(|| CameraError::FrameRead {
            details: "No buffer in sample".to_string(),
        })?;

        let (width, height) = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .map(|s| {
                (
                    s.get::<i32>("width").unwrap_or(0).max(0) as u32,
                    s.get::<i32>("height").unwrap_or(0).max(0) as u32,
                )
            })
            .unwrap_or((0, 0));

        let map = buffer.map_readable().map_err(|e| CameraError::FrameRead {
            details: format!("Failed to map buffer: {}", e),
        })?;

        self.frames += 1;
        trace!(
            "Captured MJPEG frame {} ({}x{}, {} bytes)",
            self.frames,
            width,
            height,
            map.len()
        );

        Ok(FrameData::new(
            self.frames,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width,
            height,
            FrameFormat::Mjpeg,
        ))
    }

    fn index(&self) -> i32 {
        self.index
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline for camera {}: {}", self.index, e);
        }
    }
}
