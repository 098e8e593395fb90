use crate::config::ScannerConfig;
use crate::frame::FrameData;
use tracing::{debug, trace, warn};

/// Outcome of a single decode attempt.
///
/// `NotFound` is the expected result for most frames and is never treated
/// as an error. `Failed` means a QR grid was located but could not be
/// decoded; it is logged and the loop moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A QR code was decoded to text
    Decoded(String),
    /// No QR code in this frame
    NotFound,
    /// A grid was detected but decoding failed
    Failed { details: String },
}

impl DecodeOutcome {
    /// The decoded text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            DecodeOutcome::Decoded(text) => Some(text),
            _ => None,
        }
    }
}

/// Single-shot QR decoder over raw luminance buffers.
///
/// Wraps rqrr's prepare/detect/decode pipeline. With `try_harder` set,
/// every detected grid is attempted before giving up on a frame; otherwise
/// the first failing grid ends the attempt.
pub struct QrDecoder {
    try_harder: bool,
}

impl QrDecoder {
    /// Create a decoder from scanner configuration
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            try_harder: config.try_harder,
        }
    }

    /// Attempt to decode a QR code from a tightly packed luminance buffer
    pub fn decode_luma(&self, luma: &[u8], width: usize, height: usize) -> DecodeOutcome {
        if luma.len() < width * height {
            warn!(
                "Luma buffer too small: {} bytes for {}x{}",
                luma.len(),
                width,
                height
            );
            return DecodeOutcome::Failed {
                details: format!(
                    "luma buffer holds {} bytes, expected {}",
                    luma.len(),
                    width * height
                ),
            };
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma[y * width + x]
        });

        let grids = prepared.detect_grids();
        if grids.is_empty() {
            trace!("No QR grid in frame");
            return DecodeOutcome::NotFound;
        }

        debug!("Found {} potential QR grids", grids.len());

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => {
                    debug!("QR grid decoded: {} chars", content.len());
                    return DecodeOutcome::Decoded(content);
                }
                Err(e) => {
                    debug!("Grid decode failed: {:?}", e);
                    last_error = Some(format!("{:?}", e));
                    if !self.try_harder {
                        break;
                    }
                }
            }
        }

        DecodeOutcome::Failed {
            details: last_error.unwrap_or_else(|| "no grid decoded".to_string()),
        }
    }

    /// Attempt to decode a QR code from a captured frame
    pub fn decode_frame(&self, frame: &FrameData) -> DecodeOutcome {
        let luma = frame.to_luma();
        self.decode_luma(&luma, frame.width as usize, frame.height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QrScanConfig;
    use crate::frame::PixelFormat;
    use std::time::SystemTime;

    /// Render a QR code for `text` into a luma buffer with a quiet zone.
    fn qr_luma(text: &str) -> (Vec<u8>, usize) {
        const MODULE_PX: usize = 8;
        const QUIET_MODULES: usize = 4;

        let code = qrcode::QrCode::new(text.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let size = (modules + 2 * QUIET_MODULES) * MODULE_PX;

        let mut luma = vec![255u8; size * size];
        for (i, color) in colors.iter().enumerate() {
            if *color == qrcode::Color::Dark {
                let mx = i % modules + QUIET_MODULES;
                let my = i / modules + QUIET_MODULES;
                for dy in 0..MODULE_PX {
                    for dx in 0..MODULE_PX {
                        luma[(my * MODULE_PX + dy) * size + mx * MODULE_PX + dx] = 0;
                    }
                }
            }
        }
        (luma, size)
    }

    fn decoder() -> QrDecoder {
        QrDecoder::new(&QrScanConfig::default().scanner)
    }

    #[test]
    fn test_decodes_generated_code() {
        let (luma, size) = qr_luma("ticket=ABC123");
        let outcome = decoder().decode_luma(&luma, size, size);
        assert_eq!(
            outcome,
            DecodeOutcome::Decoded("ticket=ABC123".to_string())
        );
    }

    #[test]
    fn test_blank_frame_is_not_found() {
        let luma = vec![255u8; 200 * 200];
        assert_eq!(decoder().decode_luma(&luma, 200, 200), DecodeOutcome::NotFound);
    }

    #[test]
    fn test_short_buffer_fails() {
        let outcome = decoder().decode_luma(&[0u8; 10], 100, 100);
        assert!(matches!(outcome, DecodeOutcome::Failed { .. }));
    }

    #[test]
    fn test_decode_frame_via_rgb() {
        let (luma, size) = qr_luma("hello");
        let rgb: Vec<u8> = luma.iter().flat_map(|&v| [v, v, v]).collect();
        let frame = FrameData::new(
            0,
            SystemTime::now(),
            rgb,
            size as u32,
            size as u32,
            PixelFormat::Rgb24,
        );
        let outcome = decoder().decode_frame(&frame);
        assert_eq!(outcome.text(), Some("hello"));
    }

    #[test]
    fn test_repeated_decode_is_stable() {
        let (luma, size) = qr_luma("again");
        let d = decoder();
        for _ in 0..3 {
            assert_eq!(d.decode_luma(&luma, size, size).text(), Some("again"));
        }
    }
}
