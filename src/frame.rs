#[cfg(feature = "imaging")]
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Stand-in for the encoder's pixel layout when `imaging` is disabled
#[cfg(not(feature = "imaging"))]
#[derive(Debug, Clone, Copy)]
enum ColorType {
    L8,
    Rgb8,
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// 8-bit grayscale, one byte per pixel
    Gray8,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Gray8 => 1,
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single camera frame. Pixel data is shared so frames can be handed to the
/// display collaborator and the label capture flow without copying.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Monotonic frame counter assigned by the capture loop
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected byte length for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => !self.data.is_empty(),
        }
    }

    /// Contents of an image file holding this frame: compressed data as-is,
    /// raw pixels encoded as PNG. None when the buffer size does not match the
    /// frame geometry or the frame cannot be encoded.
    pub fn to_image_bytes(&self) -> Option<Vec<u8>> {
        if !self.validate_size() {
            return None;
        }

        let color = match self.format {
            FrameFormat::Mjpeg => return Some(self.data.as_ref().clone()),
            FrameFormat::Gray8 => ColorType::L8,
            FrameFormat::Rgb24 => ColorType::Rgb8,
        };
        self.encode_png(color)
    }

    #[cfg(feature = "imaging")]
    fn encode_png(&self, color: ColorType) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        match PngEncoder::new(&mut buf).write_image(&self.data, self.width, self.height, color) {
            Ok(()) => Some(buf),
            Err(e) => {
                tracing::warn!("PNG encoding failed for frame {}: {}", self.id, e);
                None
            }
        }
    }

    #[cfg(not(feature = "imaging"))]
    fn encode_png(&self, _color: ColorType) -> Option<Vec<u8>> {
        tracing::warn!(
            "Frame {} is raw {:?} but the imaging feature is disabled; cannot encode it",
            self.id,
            self.format
        );
        None
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_bytes_pass_compressed_frames_through() {
        let jpeg = FrameData::new(3, SystemTime::now(), vec![0xFF, 0xD8], 3, 2, FrameFormat::Mjpeg);
        assert_eq!(jpeg.to_image_bytes().unwrap(), vec![0xFF, 0xD8]);

        let short = FrameData::new(2, SystemTime::now(), vec![7; 5], 3, 2, FrameFormat::Gray8);
        assert!(short.to_image_bytes().is_none());
    }

    #[cfg(feature = "imaging")]
    #[test]
    fn test_image_bytes_encode_raw_frames_as_png() {
        let gray = FrameData::new(1, SystemTime::now(), vec![7; 6], 3, 2, FrameFormat::Gray8);
        let png = gray.to_image_bytes().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(decoded.pixels().all(|p| p.0 == [7]));

        let rgb = FrameData::new(2, SystemTime::now(), vec![1, 2, 3, 4, 5, 6], 2, 1, FrameFormat::Rgb24);
        let png = rgb.to_image_bytes().unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.into_raw(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_frame_format_properties() {
        assert!(FrameFormat::Mjpeg.is_compressed());
        assert!(!FrameFormat::Gray8.is_compressed());
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);
    }

    #[test]
    fn test_frame_size_validation() {
        let gray = FrameData::new(1, SystemTime::now(), vec![0; 16], 4, 4, FrameFormat::Gray8);
        assert_eq!(gray.expected_size(), Some(16));
        assert!(gray.validate_size());

        let short = FrameData::new(2, SystemTime::now(), vec![0; 10], 4, 4, FrameFormat::Rgb24);
        assert!(!short.validate_size());

        let jpeg = FrameData::new(3, SystemTime::now(), vec![0xFF, 0xD8], 4, 4, FrameFormat::Mjpeg);
        assert_eq!(jpeg.expected_size(), None);
        assert!(jpeg.validate_size());
    }

    #[test]
    fn test_frame_clone_shares_pixels() {
        let frame = FrameData::new(7, SystemTime::now(), vec![1, 2, 3], 1, 1, FrameFormat::Rgb24);
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &copy.data));
    }
}
