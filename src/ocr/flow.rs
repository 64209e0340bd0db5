use crate::error::OcrFlowError;
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Step of the two-photo label capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcrCaptureStep {
    ReadyFront,
    PreviewFront,
    ReadyBack,
    PreviewBack,
    Submitting,
}

impl OcrCaptureStep {
    /// Operator prompt for this step
    pub fn prompt(&self) -> &'static str {
        match self {
            OcrCaptureStep::ReadyFront => "Position the FRONT of the label and capture",
            OcrCaptureStep::PreviewFront => "Front captured. Retake, or capture the BACK",
            OcrCaptureStep::ReadyBack => "Position the BACK of the label and capture",
            OcrCaptureStep::PreviewBack => "Both sides captured. Retake or submit",
            OcrCaptureStep::Submitting => "Submitting label...",
        }
    }
}

/// Front and back label photos handed to verification together
#[derive(Debug, Clone)]
pub struct OcrPayload {
    pub front: FrameData,
    pub back: FrameData,
}

/// Two-photo label capture sub-flow, active only while the kiosk is in
/// label-scan mode.
#[derive(Debug)]
pub struct OcrCaptureFlow {
    step: OcrCaptureStep,
    front: Option<FrameData>,
    back: Option<FrameData>,
}

impl OcrCaptureFlow {
    pub fn new() -> Self {
        Self {
            step: OcrCaptureStep::ReadyFront,
            front: None,
            back: None,
        }
    }

    pub fn step(&self) -> OcrCaptureStep {
        self.step
    }

    pub fn has_front(&self) -> bool {
        self.front.is_some()
    }

    pub fn has_back(&self) -> bool {
        self.back.is_some()
    }

    /// Store a photo for the current step.
    ///
    /// Capturing again while previewing both sides replaces the back photo.
    pub fn capture(&mut self, frame: FrameData) -> Result<OcrCaptureStep, OcrFlowError> {
        self.step = match self.step {
            OcrCaptureStep::ReadyFront => {
                self.front = Some(frame);
                OcrCaptureStep::PreviewFront
            }
            OcrCaptureStep::PreviewFront | OcrCaptureStep::ReadyBack | OcrCaptureStep::PreviewBack => {
                self.back = Some(frame);
                OcrCaptureStep::PreviewBack
            }
            OcrCaptureStep::Submitting => {
                return Err(OcrFlowError::CaptureRejected { step: self.step });
            }
        };
        debug!("Label capture step -> {:?}", self.step);
        Ok(self.step)
    }

    /// Discard the most recent photo and step back one stage
    pub fn retake(&mut self) -> Result<OcrCaptureStep, OcrFlowError> {
        self.step = match self.step {
            OcrCaptureStep::PreviewFront => {
                self.front = None;
                OcrCaptureStep::ReadyFront
            }
            OcrCaptureStep::PreviewBack => {
                self.back = None;
                OcrCaptureStep::ReadyBack
            }
            step => return Err(OcrFlowError::NothingToRetake { step }),
        };
        debug!("Label capture retake -> {:?}", self.step);
        Ok(self.step)
    }

    /// Freeze both photos for verification. Only legal once both sides are
    /// previewed; the flow stays in `Submitting` until reset.
    pub fn submit(&mut self) -> Result<OcrPayload, OcrFlowError> {
        if self.step != OcrCaptureStep::PreviewBack {
            return Err(OcrFlowError::IncompletePair { step: self.step });
        }

        match (self.front.take(), self.back.take()) {
            (Some(front), Some(back)) => {
                self.step = OcrCaptureStep::Submitting;
                Ok(OcrPayload { front, back })
            }
            (front, back) => {
                self.front = front;
                self.back = back;
                Err(OcrFlowError::IncompletePair { step: self.step })
            }
        }
    }

    /// Discard both photos without dispatching. Legal from any step.
    pub fn cancel(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.step = OcrCaptureStep::ReadyFront;
        self.front = None;
        self.back = None;
    }
}

impl Default for OcrCaptureFlow {
    fn default() -> Self {
        Self::new()
    }
}
