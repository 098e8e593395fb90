use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel format of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// RGB24 format - 3 bytes per pixel, as produced by the camera decoder
    Rgb24,
    /// 8-bit luminance - 1 byte per pixel, as consumed by the QR decoder
    Luma8,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

/// Frame data structure containing raw pixel data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
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

    /// Get the expected data size for the frame dimensions
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Convert the frame to a tightly packed 8-bit luminance buffer.
    ///
    /// RGB frames use the integer luminance weighting
    /// Y = (299*R + 587*G + 114*B) / 1000; luma frames are returned as-is.
    pub fn to_luma(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Luma8 => self.data.as_ref().clone(),
            PixelFormat::Rgb24 => {
                let mut luma = Vec::with_capacity(self.width as usize * self.height as usize);
                for chunk in self.data.chunks(3) {
                    if chunk.len() == 3 {
                        let gray = (chunk[0] as u32 * 299
                            + chunk[1] as u32 * 587
                            + chunk[2] as u32 * 114)
                            / 1000;
                        luma.push(gray as u8);
                    }
                }
                luma
            }
        }
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

    fn rgb_frame(pixels: &[[u8; 3]], width: u32, height: u32) -> FrameData {
        let data: Vec<u8> = pixels.iter().flatten().copied().collect();
        FrameData::new(0, SystemTime::now(), data, width, height, PixelFormat::Rgb24)
    }

    #[test]
    fn test_expected_size() {
        let frame = rgb_frame(&[[0, 0, 0]; 4], 2, 2);
        assert_eq!(frame.expected_size(), 12);
        assert!(frame.validate_size());
    }

    #[test]
    fn test_size_mismatch_detected() {
        let frame = FrameData::new(
            0,
            SystemTime::now(),
            vec![0u8; 5],
            2,
            2,
            PixelFormat::Luma8,
        );
        assert!(!frame.validate_size());
    }

    #[test]
    fn test_luma_conversion_extremes() {
        let frame = rgb_frame(&[[0, 0, 0], [255, 255, 255]], 2, 1);
        let luma = frame.to_luma();
        assert_eq!(luma.len(), 2);
        assert_eq!(luma[0], 0);
        // 299 + 587 + 114 = 1000, so pure white stays 255
        assert_eq!(luma[1], 255);
    }

    #[test]
    fn test_luma_weighting_favors_green() {
        let red = rgb_frame(&[[255, 0, 0]], 1, 1).to_luma()[0];
        let green = rgb_frame(&[[0, 255, 0]], 1, 1).to_luma()[0];
        let blue = rgb_frame(&[[0, 0, 255]], 1, 1).to_luma()[0];
        assert!(green > red);
        assert!(red > blue);
    }

    #[test]
    fn test_luma_passthrough() {
        let frame = FrameData::new(
            0,
            SystemTime::now(),
            vec![10, 20, 30, 40],
            2,
            2,
            PixelFormat::Luma8,
        );
        assert_eq!(frame.to_luma(), vec![10, 20, 30, 40]);
    }
}
