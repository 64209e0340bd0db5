mod extract;
mod flow;

pub use extract::{ScriptedTextExtractor, TesseractExtractor, TextExtractor};
pub use flow::{OcrCaptureFlow, OcrCaptureStep, OcrPayload};
