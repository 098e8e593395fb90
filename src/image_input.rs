use crate::config::ScannerConfig;
use crate::decode::{DecodeOutcome, QrDecoder};
use crate::events::{EventBus, ScanEvent, ScanSource};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Per-file result of a batch scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileScanOutcome {
    /// The file held a decodable QR code
    Decoded { path: PathBuf, text: String },
    /// The file was a readable image without a decodable QR code
    NotFound { path: PathBuf },
    /// The file could not be read or decoded as an image
    Unreadable { path: PathBuf, details: String },
}

/// Still-image decoding, independent of the camera path.
///
/// Reuses the same single-shot decoder as live scanning; detections go
/// through the same add-if-new path, so a code scanned once via camera and
/// again from a file is not duplicated.
pub struct ImageFileScanner {
    decoder: QrDecoder,
}

impl ImageFileScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            decoder: QrDecoder::new(config),
        }
    }

    /// Decode one image file
    pub async fn scan_file(&self, path: &Path) -> FileScanOutcome {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return FileScanOutcome::Unreadable {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                }
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                return FileScanOutcome::Unreadable {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                }
            }
        };

        // Canvas sized to the image's natural dimensions
        let gray = image.to_luma8();
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        debug!("Decoding image file {} ({}x{})", path.display(), width, height);

        match self.decoder.decode_luma(gray.as_raw(), width, height) {
            DecodeOutcome::Decoded(text) => FileScanOutcome::Decoded {
                path: path.to_path_buf(),
                text,
            },
            DecodeOutcome::NotFound => FileScanOutcome::NotFound {
                path: path.to_path_buf(),
            },
            DecodeOutcome::Failed { details } => {
                warn!("QR decode failed for {}: {}", path.display(), details);
                FileScanOutcome::NotFound {
                    path: path.to_path_buf(),
                }
            }
        }
    }

    /// Decode a batch of image files, publishing a detection per decoded
    /// file. A failure for one file never aborts its siblings.
    pub async fn scan_files(
        &self,
        paths: &[PathBuf],
        event_bus: &EventBus,
    ) -> Vec<FileScanOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());

        for path in paths {
            let outcome = self.scan_file(path).await;
            match &outcome {
                FileScanOutcome::Decoded { text, .. } => {
                    info!("Decoded QR code from {}", path.display());
                    if let Err(e) = event_bus.publish(ScanEvent::CodeDetected {
                        text: text.clone(),
                        source: ScanSource::File,
                        timestamp: SystemTime::now(),
                    }) {
                        warn!("File detection not delivered: {}", e);
                    }
                }
                FileScanOutcome::NotFound { .. } => {
                    info!("No QR code found in {}", path.display());
                }
                FileScanOutcome::Unreadable { details, .. } => {
                    warn!("Skipping unreadable file {}: {}", path.display(), details);
                }
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}
