use super::device::{BoundingRegion, DecodedSymbol, SymbolDecoder};
use crate::frame::{FrameData, FrameFormat};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace, warn};

/// zbarimg exit status when the image holds no symbol
const NO_SYMBOL_FOUND: i32 = 4;

/// QR decoder backed by the `zbarimg` CLI.
///
/// Runs on the capture thread. `decode_every` above 1 hands only every Nth
/// frame to zbar on hosts too slow to decode at the capture rate. zbarimg
/// does not report symbol positions, so the region always covers the whole
/// frame.
pub struct ZbarDecoder {
    binary: String,
    scratch: PathBuf,
    decode_every: u64,
    seen: u64,
}

impl ZbarDecoder {
    pub fn new(decode_every: u32) -> Self {
        Self {
            binary: "zbarimg".to_string(),
            scratch: std::env::temp_dir().join(format!("verikiosk-{}", std::process::id())),
            decode_every: u64::from(decode_every.max(1)),
            seen: 0,
        }
    }

    fn scratch_path(&self, format: FrameFormat) -> PathBuf {
        // Raw frames are encoded as PNG before decoding
        let extension = match format {
            FrameFormat::Mjpeg => "jpg",
            FrameFormat::Gray8 | FrameFormat::Rgb24 => "png",
        };
        self.scratch.with_extension(extension)
    }
}

impl SymbolDecoder for ZbarDecoder {
    fn decode(&mut self, frame: &FrameData) -> Vec<DecodedSymbol> {
        self.seen += 1;
        if self.seen % self.decode_every != 0 {
            return Vec::new();
        }

        let Some(image) = frame.to_image_bytes() else {
            trace!("Skipping malformed frame {}", frame.id);
            return Vec::new();
        };
        let path = self.scratch_path(frame.format);
        if let Err(e) = std::fs::write(&path, image) {
            warn!("Failed to write decode scratch file {}: {}", path.display(), e);
            return Vec::new();
        }

        let output = match Command::new(&self.binary)
            .args(["--raw", "-q", "-Sdisable", "-Sqrcode.enable"])
            .arg(&path)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to run {}: {}", self.binary, e);
                return Vec::new();
            }
        };

        if !output.status.success() {
            if output.status.code() != Some(NO_SYMBOL_FOUND) {
                debug!("{} exited with {}", self.binary, output.status);
            }
            return Vec::new();
        }

        let region = BoundingRegion {
            x: 0,
            y: 0,
            width: frame.width,
            height: frame.height,
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|payload| DecodedSymbol {
                payload: payload.to_string(),
                region,
            })
            .collect()
    }
}

impl Drop for ZbarDecoder {
    fn drop(&mut self) {
        for format in [FrameFormat::Mjpeg, FrameFormat::Gray8] {
            let _ = std::fs::remove_file(self.scratch_path(format));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_decodes_every_frame_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut decoder = ZbarDecoder::new(1);
        decoder.binary = "/nonexistent/zbarimg".to_string();
        decoder.scratch = dir.path().join("scratch");
        let frame = FrameData::new(1, SystemTime::now(), vec![0xFF, 0xD8], 2, 2, FrameFormat::Mjpeg);

        for n in 1..=3 {
            assert!(decoder.decode(&frame).is_empty());
            assert!(decoder.scratch_path(FrameFormat::Mjpeg).exists(), "frame {} not written", n);
            std::fs::remove_file(decoder.scratch_path(FrameFormat::Mjpeg)).unwrap();
        }
    }

    #[test]
    fn test_skips_frames_between_decodes() {
        let mut decoder = ZbarDecoder::new(3);
        decoder.binary = "/nonexistent/zbarimg".to_string();
        let frame = FrameData::new(1, SystemTime::now(), vec![0; 4], 2, 2, FrameFormat::Gray8);

        // A missing binary only yields no symbols
        for _ in 0..6 {
            assert!(decoder.decode(&frame).is_empty());
        }
        assert_eq!(decoder.seen, 6);
    }
}
