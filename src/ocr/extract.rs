use crate::error::{KioskError, Result};
use crate::frame::FrameData;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Text recognition primitive
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, frame: &FrameData) -> Result<String>;
}

/// Runs the `tesseract` CLI, piping the image through stdin
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    binary: String,
    language: String,
}

impl TesseractExtractor {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }

    pub fn with_language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = language.into();
        self
    }
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, frame: &FrameData) -> Result<String> {
        let image = frame.to_image_bytes().ok_or_else(|| {
            KioskError::component("ocr", format!("frame {} has an unexpected size", frame.id))
        })?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KioskError::component("ocr", format!("failed to start tesseract: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&image).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(KioskError::component(
                "ocr",
                format!("tesseract exited with {}", output.status),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Extracted {} characters from frame {}", text.len(), frame.id);
        Ok(text)
    }
}

/// Returns queued texts in order, then empty strings. Used for demo runs
/// without an OCR engine and in tests.
#[derive(Debug, Default)]
pub struct ScriptedTextExtractor {
    texts: Mutex<VecDeque<String>>,
}

impl ScriptedTextExtractor {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: Mutex::new(texts.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push<S: Into<String>>(&self, text: S) {
        self.texts.lock().push_back(text.into());
    }
}

#[async_trait]
impl TextExtractor for ScriptedTextExtractor {
    async fn extract_text(&self, _frame: &FrameData) -> Result<String> {
        Ok(self.texts.lock().pop_front().unwrap_or_default())
    }
}
